//! Schema description loading.
//!
//! A description is a sequence of wire-syntax forms, with `;` line comments:
//!
//! ```text
//! (define-package lichat)
//! (define-object channel-update () channel)
//! (define-object join (channel-update))
//! (define-object connect ()
//!   (password :type string)
//!   (version :default "2.0")
//!   (extensions :default ()))
//! (define-extension shirakumo-backfill
//!   (define-object backfill (channel-update)))
//! ```

use crate::codec::WireValue;
use crate::error::{LichatError, Result};
use crate::symbol::{Symbol, DEFAULT_NAMESPACE};

use super::Registry;

impl Registry {
    /// Load every form of a schema description.
    ///
    /// Forms are applied in order, so parents must be declared before the
    /// kinds that compose them.
    pub fn load(&mut self, text: &str) -> Result<()> {
        let mut package = DEFAULT_NAMESPACE.to_string();
        let mut pos = 0;
        loop {
            pos = skip_blank(text, pos);
            if pos >= text.len() {
                return Ok(());
            }
            let (form, next) = match self.reader().decode(text, pos, text.len()) {
                Ok(decoded) => decoded,
                Err(LichatError::Incomplete) => {
                    return Err(LichatError::Schema(format!(
                        "unterminated form at offset {}",
                        pos
                    )))
                }
                Err(err) => return Err(err),
            };
            self.load_form(&form, &mut package)?;
            pos = next;
        }
    }

    fn load_form(&mut self, form: &WireValue, package: &mut String) -> Result<()> {
        let items = form
            .as_list()
            .ok_or_else(|| LichatError::Schema(format!("expected a form, got {:?}", form)))?;
        let (head, args) = items
            .split_first()
            .ok_or_else(|| LichatError::Schema("empty form".into()))?;
        let operator = head
            .as_symbol()
            .ok_or_else(|| LichatError::Schema(format!("form operator {:?} is not a symbol", head)))?;

        match operator.key() {
            "define-package" => {
                let name = args
                    .first()
                    .and_then(name_of)
                    .ok_or_else(|| LichatError::Schema("define-package needs a name".into()))?;
                *package = self.symbols().define_namespace(&name);
                Ok(())
            }
            "define-object" | "define-object-extension" => {
                let extend = operator.key() == "define-object-extension";
                let tag = args
                    .first()
                    .and_then(WireValue::as_symbol)
                    .ok_or_else(|| LichatError::Schema(format!("{} needs a tag", operator.name())))?;
                let tag = self.rehome(tag, package);
                let parents = match args.get(1) {
                    None | Some(WireValue::Bool(false)) => Vec::new(),
                    Some(WireValue::List(parents)) => parents
                        .iter()
                        .map(|p| {
                            p.as_symbol()
                                .map(|s| self.rehome(s, package))
                                .ok_or_else(|| LichatError::Schema(format!("bad parent {:?}", p)))
                        })
                        .collect::<Result<Vec<_>>>()?,
                    Some(other) => {
                        return Err(LichatError::Schema(format!(
                            "parent list of {} is {:?}",
                            tag.name(),
                            other
                        )))
                    }
                };
                let fields = args
                    .iter()
                    .skip(2)
                    .map(parse_field)
                    .collect::<Result<Vec<_>>>()?;

                if extend {
                    self.extend_kind(&tag, &parents, fields)?;
                } else {
                    self.define_kind(tag, &parents, fields)?;
                }
                Ok(())
            }
            "define-extension" => {
                let name = args
                    .first()
                    .and_then(name_of)
                    .ok_or_else(|| LichatError::Schema("define-extension needs a name".into()))?;
                self.add_extension(&name);
                for nested in &args[1..] {
                    self.load_form(nested, package)?;
                }
                Ok(())
            }
            other => Err(LichatError::Schema(format!("unknown form {}", other))),
        }
    }

    /// Move an unqualified symbol into the current package.
    fn rehome(&self, symbol: &Symbol, package: &str) -> Symbol {
        if symbol.namespace() == DEFAULT_NAMESPACE && package != DEFAULT_NAMESPACE {
            self.symbols().intern(symbol.name(), package)
        } else {
            symbol.clone()
        }
    }
}

fn name_of(value: &WireValue) -> Option<String> {
    match value {
        WireValue::Symbol(symbol) => Some(symbol.name().to_string()),
        WireValue::String(s) => Some(s.clone()),
        _ => None,
    }
}

/// A field is a bare name or `(name :default value ...)`.
fn parse_field(spec: &WireValue) -> Result<(String, Option<WireValue>)> {
    match spec {
        WireValue::Symbol(name) => Ok((name.key().to_string(), None)),
        WireValue::List(items) => {
            let (name, props) = items
                .split_first()
                .and_then(|(name, props)| name.as_symbol().map(|n| (n, props)))
                .ok_or_else(|| LichatError::Schema(format!("bad field {:?}", spec)))?;
            if props.len() % 2 != 0 {
                return Err(LichatError::Schema(format!(
                    "odd property list for field {}",
                    name.name()
                )));
            }
            let default = props
                .chunks_exact(2)
                .find(|pair| matches!(&pair[0], WireValue::Symbol(k) if k.is_keyword() && k.key() == "default"))
                .map(|pair| pair[1].clone());
            Ok((name.key().to_string(), default))
        }
        other => Err(LichatError::Schema(format!("bad field {:?}", other))),
    }
}

/// Skip whitespace and `;` line comments.
fn skip_blank(text: &str, mut pos: usize) -> usize {
    let bytes = text.as_bytes();
    while pos < bytes.len() {
        match bytes[pos] {
            b' ' | b'\t' | b'\n' | b'\r' | b'\x0c' => pos += 1,
            b';' => {
                pos = text[pos..]
                    .find('\n')
                    .map(|offset| pos + offset + 1)
                    .unwrap_or(bytes.len());
            }
            _ => break,
        }
    }
    pos
}
