fn main() -> anyhow::Result<()> {
    dotagent::cli::run_cli()
}
