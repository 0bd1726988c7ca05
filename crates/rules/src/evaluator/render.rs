//! Query rendering.
//!
//! Rule queries are JMESPath filter bodies that may reference the matched
//! parent resource through `{{parent.<path>}}` placeholders. Rendering
//! substitutes the placeholders with minijinja and wraps the result into a
//! collection filter `[?<expr>]`.

use azca_core::Resource;
use minijinja::{context, escape_formatter, Environment, Error, UndefinedBehavior};
use serde_json::Value;

/// Stand-in for unbound placeholders when a query is only compiled.
const PLACEHOLDER_SAMPLE: &str = "parent";

/// Render a rule query into a collection-filter expression.
///
/// Placeholders are only substituted when a parent is supplied; a missing
/// or `null` path on the parent renders as an empty string. Pure and
/// deterministic.
pub fn render(query: &str, parent: Option<&Resource>) -> Result<String, String> {
    let body = match parent {
        Some(parent) => substitute_parent(query, parent, "")?,
        None => query.to_string(),
    };
    Ok(format!("[?{}]", normalize_legacy_literals(&body)))
}

/// Render a child query for compilation only, before any parent is known.
///
/// Every placeholder becomes a bare identifier, so placeholders used as
/// path segments or operands compile the same way they will once bound.
pub(crate) fn render_unbound(query: &str) -> Result<String, String> {
    let empty = Value::Object(Default::default());
    let body = substitute_parent(query, &empty, PLACEHOLDER_SAMPLE)?;
    Ok(format!("[?{}]", normalize_legacy_literals(&body)))
}

fn substitute_parent(query: &str, parent: &Resource, blank: &'static str) -> Result<String, String> {
    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Chainable);
    env.set_formatter(move |out, state, value| {
        if value.is_undefined() || value.is_none() {
            out.write_str(blank).map_err(Error::from)
        } else {
            escape_formatter(out, state, value)
        }
    });
    env.render_str(query, context! { parent => parent })
        .map_err(|e| format!("template error: {e}"))
}

/// Rewrite backtick literals that are not valid JSON into JSON strings.
///
/// Rule files commonly write `` `Microsoft.Web/sites` `` in the legacy
/// form where an unparsable literal means a raw string. Literals inside
/// quoted strings and identifiers are left alone.
pub(crate) fn normalize_legacy_literals(expr: &str) -> String {
    let mut out = String::with_capacity(expr.len());
    let mut chars = expr.chars();
    let mut quote: Option<char> = None;

    while let Some(c) = chars.next() {
        if let Some(q) = quote {
            out.push(c);
            if c == '\\' {
                if let Some(escaped) = chars.next() {
                    out.push(escaped);
                }
            } else if c == q {
                quote = None;
            }
            continue;
        }

        match c {
            '\'' | '"' => {
                quote = Some(c);
                out.push(c);
            }
            '`' => {
                let mut literal = String::new();
                let mut closed = false;
                while let Some(n) = chars.next() {
                    match n {
                        '`' => {
                            closed = true;
                            break;
                        }
                        '\\' => match chars.next() {
                            Some('`') => literal.push('`'),
                            Some(other) => {
                                literal.push('\\');
                                literal.push(other);
                            }
                            None => literal.push('\\'),
                        },
                        _ => literal.push(n),
                    }
                }

                out.push('`');
                if !closed {
                    // Unterminated; let the compiler report it.
                    out.push_str(&literal);
                    continue;
                }
                let json = if serde_json::from_str::<serde_json::Value>(&literal).is_ok() {
                    literal
                } else {
                    serde_json::Value::String(literal).to_string()
                };
                out.push_str(&json.replace('`', "\\`"));
                out.push('`');
            }
            _ => out.push(c),
        }
    }

    out
}
