// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! ES module shim generation
//!
//! A shim loads the CommonJS bundle through `createRequire` (which keeps
//! `@rollup/plugin-commonjs` out of the picture) and re-exports each
//! top-level property under its own name:
//!
//! ```js
//! import { createRequire } from "module";
//! const cjsRequire = createRequire(import.meta.url);
//! const _M_ = cjsRequire("./.natives/fsevents.cjs");
//! export const watch = _M_.watch;
//! export default _M_;
//! ```
//!
//! Names that are reserved words in module code, or that would shadow the
//! shim's own bindings, are bound to an alias first and exported with
//! `export { alias as name }`. Names that are not identifiers at all are
//! rejected.

use crate::error::{NativesError, Result};
use std::collections::HashSet;
use std::fmt::Write;
use unicode_xid::UnicodeXID;

/// Local binding holding the CommonJS module
pub const MODULE_BINDING: &str = "_M_";

/// Local binding holding the synthesized `require`
pub const REQUIRE_BINDING: &str = "cjsRequire";

/// Words that cannot be used as a binding in strict module code
const RESERVED_WORDS: &[&str] = &[
    "await", "break", "case", "catch", "class", "const", "continue", "debugger", "default",
    "delete", "do", "else", "enum", "export", "extends", "false", "finally", "for", "function",
    "if", "import", "in", "instanceof", "new", "null", "return", "super", "switch", "this",
    "throw", "true", "try", "typeof", "var", "void", "while", "with", "yield",
    // strict mode
    "implements", "interface", "let", "package", "private", "protected", "public", "static",
    "arguments", "eval",
];

/// Check if `name` is an ECMAScript IdentifierName
pub fn is_identifier_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first == '$' || first == '_' || first.is_xid_start() => {}
        _ => return false,
    }
    chars.all(|c| c == '$' || c == '\u{200c}' || c == '\u{200d}' || c.is_xid_continue())
}

/// Check if `name` is reserved in module code
pub fn is_reserved_word(name: &str) -> bool {
    RESERVED_WORDS.contains(&name)
}

/// Generate the shim for `module_name`, whose bundle is required from `bundle_reference`.
///
/// Output is a pure function of the arguments. A `default` entry in
/// `export_names` re-exports the module's own `default` property; otherwise
/// the whole CommonJS module is the default export.
pub fn generate(module_name: &str, export_names: &[String], bundle_reference: &str) -> Result<String> {
    let reference = serde_json::to_string(bundle_reference)?;

    let mut source = String::new();
    // Writing to a String cannot fail
    let _ = writeln!(source, "import {{ createRequire }} from \"module\";");
    let _ = writeln!(source, "const {REQUIRE_BINDING} = createRequire(import.meta.url);");
    let _ = writeln!(source, "const {MODULE_BINDING} = {REQUIRE_BINDING}({reference});");

    let taken: HashSet<&str> = export_names.iter().map(String::as_str).collect();
    let mut seen = HashSet::new();
    let mut has_default = false;

    for name in export_names {
        if !seen.insert(name.as_str()) {
            continue;
        }
        if name == "default" {
            has_default = true;
            continue;
        }
        if !is_identifier_name(name) {
            return Err(NativesError::InvalidExportName {
                module: module_name.to_string(),
                name: name.clone(),
            });
        }

        if is_reserved_word(name) || is_shim_binding(name) {
            let alias = alias_for(name, &taken);
            let _ = writeln!(source, "const {alias} = {MODULE_BINDING}.{name};");
            let _ = writeln!(source, "export {{ {alias} as {name} }};");
        } else {
            let _ = writeln!(source, "export const {name} = {MODULE_BINDING}.{name};");
        }
    }

    if has_default {
        let _ = writeln!(source, "export default {MODULE_BINDING}.default;");
    } else {
        let _ = writeln!(source, "export default {MODULE_BINDING};");
    }

    Ok(source)
}

fn is_shim_binding(name: &str) -> bool {
    name == MODULE_BINDING || name == REQUIRE_BINDING || name == "createRequire"
}

/// A local name for `name` that collides with no export and no shim binding
fn alias_for(name: &str, taken: &HashSet<&str>) -> String {
    let mut alias = format!("{MODULE_BINDING}{name}");
    while taken.contains(alias.as_str()) || is_shim_binding(&alias) {
        alias.push('_');
    }
    alias
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_generate_basic() {
        let shim = generate(
            "fsevents",
            &names(&["watch", "getInfo", "constants"]),
            "./.natives/fsevents.cjs",
        )
        .unwrap();

        assert_eq!(
            shim,
            "import { createRequire } from \"module\";\n\
             const cjsRequire = createRequire(import.meta.url);\n\
             const _M_ = cjsRequire(\"./.natives/fsevents.cjs\");\n\
             export const watch = _M_.watch;\n\
             export const getInfo = _M_.getInfo;\n\
             export const constants = _M_.constants;\n\
             export default _M_;\n"
        );
    }

    #[test]
    fn test_generate_is_deterministic() {
        let exports = names(&["open", "Database", "verbose"]);
        let first = generate("sqlite3", &exports, "./.natives/sqlite3.cjs").unwrap();
        let second = generate("sqlite3", &exports, "./.natives/sqlite3.cjs").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_export_order_is_preserved() {
        let shim = generate("m", &names(&["c", "a", "b"]), "./m.cjs").unwrap();
        let c = shim.find("export const c").unwrap();
        let a = shim.find("export const a").unwrap();
        let b = shim.find("export const b").unwrap();
        assert!(c < a && a < b);
    }

    #[test]
    fn test_reserved_words_are_aliased() {
        // Object.getOwnPropertyNames of a sloppy-mode function
        let shim = generate(
            "better-sqlite3",
            &names(&["length", "name", "arguments", "caller", "prototype", "delete"]),
            "./.natives/better-sqlite3.cjs",
        )
        .unwrap();

        assert!(shim.contains("export const length = _M_.length;\n"));
        assert!(shim.contains("const _M_arguments = _M_.arguments;\nexport { _M_arguments as arguments };\n"));
        assert!(shim.contains("const _M_delete = _M_.delete;\nexport { _M_delete as delete };\n"));
        assert!(!shim.contains("export const arguments"));
    }

    #[test]
    fn test_shim_bindings_are_aliased() {
        let shim = generate("m", &names(&["_M_", "cjsRequire", "_M__M_"]), "./m.cjs").unwrap();
        assert!(shim.contains("const _M__M__ = _M_._M_;\nexport { _M__M__ as _M_ };\n"));
        assert!(shim.contains("export { _M_cjsRequire as cjsRequire };\n"));
        assert!(shim.contains("export const _M__M_ = _M_._M__M_;\n"));
    }

    #[test]
    fn test_default_export_is_preserved() {
        let shim = generate("m", &names(&["default", "helper"]), "./m.cjs").unwrap();
        assert!(shim.ends_with("export default _M_.default;\n"));
        assert!(!shim.contains("export const default"));
    }

    #[test]
    fn test_duplicate_names_emitted_once() {
        let shim = generate("m", &names(&["a", "a"]), "./m.cjs").unwrap();
        assert_eq!(shim.matches("export const a ").count(), 1);
    }

    #[test]
    fn test_invalid_name_fails_loudly() {
        let err = generate("m", &names(&["ok", "not-valid"]), "./m.cjs").unwrap_err();
        match err {
            NativesError::InvalidExportName { module, name } => {
                assert_eq!(module, "m");
                assert_eq!(name, "not-valid");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(generate("m", &names(&["0"]), "./m.cjs").is_err());
    }

    #[test]
    fn test_reference_is_escaped() {
        let shim = generate("m", &[], "./.natives/we\"ird.cjs").unwrap();
        assert!(shim.contains("cjsRequire(\"./.natives/we\\\"ird.cjs\")"));
    }

    #[test]
    fn test_identifier_names() {
        assert!(is_identifier_name("$"));
        assert!(is_identifier_name("_private"));
        assert!(is_identifier_name("café"));
        assert!(!is_identifier_name(""));
        assert!(!is_identifier_name("1abc"));
        assert!(!is_identifier_name("a.b"));
    }
}
