use clap::Parser;
use smart_pdf_md::cli;

fn main() {
    let args = cli::Args::parse();
    std::process::exit(cli::dispatch(args));
}
