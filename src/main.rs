use clap::Parser;
use log::info;
use simple_logger::init_with_level;
use xmut::{Args, xmut};

fn main() {
    let args = Args::parse();

    init_with_level(args.level).unwrap_or_else(|e| panic!("{}", e));
    info!("Starting xmut with args: {}", args);

    xmut(args);
}
