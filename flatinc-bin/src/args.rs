use clap::*;

#[derive(Parser, Debug, Clone)]
pub struct Args {
    pub input: String,

    #[arg(short, long)]
    pub output: Option<String>,

    /// Search directories for angle includes and unresolved quoted
    /// includes, consulted in the order given.
    #[arg(short = 'I', long = "include")]
    pub include: Vec<String>,
}
