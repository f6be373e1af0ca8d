//! Common test utilities for driver tests.

use std::io::Write;

use tempfile::NamedTempFile;

pub const SQUARE_IR: &str = r#"
define internal i32 @square(i32 %x) {
  %r = mul i32 %x, %x
  ret i32 %r
}

define i32 @total(i32 %a, i32 %b) {
  %p = call i32 @square(i32 %a)
  %q = call i32 @square(i32 %b)
  %s = add i32 %p, %q
  ret i32 %s
}
"#;

/// Write IR source to a temporary `.ll` file that lives as long as the handle.
#[allow(dead_code)]
pub fn write_ir(source: &str) -> NamedTempFile {
    let mut file = NamedTempFile::with_suffix(".ll").expect("Failed to create temp file");
    file.write_all(source.as_bytes())
        .expect("Failed to write IR");
    file
}
