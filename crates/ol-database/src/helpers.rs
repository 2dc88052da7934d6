/// Quote an identifier for interpolation into SQL text. Table and column
/// names come from source metadata and staged file names, not from a fixed
/// schema, so they always go through here.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
