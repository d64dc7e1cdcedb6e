fn main() -> anyhow::Result<()> {
    bastion::main()
}
