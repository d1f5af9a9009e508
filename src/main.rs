fn main() -> anyhow::Result<()> {
    repotx::run()
}
