use anyhow::Result;

use codeshape::analyzer::registry;
use codeshape::output::style;

/// Prints every registered extension with the language and analyzer kind serving it.
pub fn run() -> Result<()> {
    let extensions = registry::global().extensions();
    println!("{}", style::heading("Registered extensions:"));
    for (ext, (language, kind)) in &extensions {
        println!(
            "  .{ext:<8} {language:<12} {}",
            style::info(kind.as_str())
        );
    }
    println!();
    println!("{} extensions", extensions.len());
    Ok(())
}
