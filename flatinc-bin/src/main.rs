mod args;

use std::path::PathBuf;

fn main() {
    let args = <args::Args as clap::Parser>::parse();

    let search_path = args.include.iter().map(PathBuf::from).collect::<Vec<_>>();
    let result = args.output.as_deref().map_or_else(
        || flatinc::expand(&args.input, &mut std::io::stdout().lock(), &search_path),
        |out| flatinc::expand_to_path(&args.input, out, &search_path),
    );

    if let Err(err) = result {
        eprintln!("{err}");
        std::process::exit(1);
    }
}
