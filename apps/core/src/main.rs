fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let options = match appshelf_core::runtime::parse_cli_args(&args) {
        Ok(options) => options,
        Err(error) => {
            eprintln!("[appshelf-core] {error}");
            eprintln!("{}", appshelf_core::runtime::USAGE);
            std::process::exit(2);
        }
    };

    if let Err(error) = appshelf_core::runtime::run_with_options(options) {
        eprintln!("[appshelf-core] runtime failed: {error}");
        std::process::exit(1);
    }
}
