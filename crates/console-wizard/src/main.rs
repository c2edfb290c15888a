fn main() -> anyhow::Result<()> {
    console_wizard::cli::main()
}
