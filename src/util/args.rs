use std::path::PathBuf;
use structopt::StructOpt;

/// Compiler for a small Pascal dialect.
#[derive(StructOpt)]
#[structopt(name = "minipas")]
pub struct Args {
    /// Source file; without one an interactive prompt is started.
    #[structopt(name = "FILE_NAME", parse(from_os_str))]
    pub file_name: Option<PathBuf>,

    /// Print the instruction listing of the compiled program.
    #[structopt(short, long)]
    pub listing: bool,
}

impl Default for Args {
    fn default() -> Self {
        Self::new()
    }
}

impl Args {
    pub fn new() -> Self {
        Self::from_args()
    }
}
