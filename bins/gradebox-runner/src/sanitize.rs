// Source normalization: candidate code may use module-export syntax, but
// the execution context loads plain scripts. Strip the export keywords so
// the declarations land at the top level, without otherwise changing the
// code. Pure text transformation - nothing here executes candidate code.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref EXPORT_DEFAULT_FN: Regex =
        Regex::new(r"\bexport\s+default\s+function\s+([A-Za-z0-9_]+)?").unwrap();
    static ref EXPORT_FN: Regex = Regex::new(r"\bexport\s+function\s+").unwrap();
    static ref EXPORT_BINDING: Regex = Regex::new(r"\bexport\s+(const|let|var)\s+").unwrap();
}

pub fn strip_module_exports(code: &str) -> String {
    let code = EXPORT_DEFAULT_FN.replace_all(code, "function $1");
    let code = EXPORT_FN.replace_all(&code, "function ");
    EXPORT_BINDING.replace_all(&code, "$1 ").into_owned()
}
