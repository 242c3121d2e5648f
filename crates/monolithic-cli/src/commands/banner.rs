const NAME: &str = "monolithic";
const DESCRIPTION: &str = "A library for ultra-precision optical metrology and fabrication.";

/// The text printed when no subcommand is given.
pub fn banner() -> String {
    format!("{NAME}\n{}\n{DESCRIPTION}", "=".repeat(NAME.len()))
}

pub fn show_banner() {
    println!("{}", banner());
}
