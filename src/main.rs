use terraform_provider_vcfa::VcfaProvider;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tf_provider::serve("vcfa", VcfaProvider::default()).await?;
    Ok(())
}
