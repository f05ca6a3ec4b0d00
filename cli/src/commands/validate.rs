use crate::output::OutputManager;
use anyhow::Result;
use clap::Args;
use ormbench_engine::schema::SchemaMapping;
use ormbench_engine::simulated::default_registry;
use ormbench_engine::EngineConfig;

#[derive(Args, Debug)]
pub struct ValidateArgs {}

/// Check the configuration, backend selection and schema mapping without running
pub async fn execute(_args: ValidateArgs, config: &EngineConfig, output: &OutputManager) -> Result<()> {
    config.validate()?;

    let registry = default_registry();
    let backends = registry.resolve(&config.benchmark.backend)?;

    let mapping = SchemaMapping::taxi_trips();
    mapping.validate()?;

    output.print_success(&format!(
        "Configuration is valid: {} records in chunks of {}, backends {}",
        config.benchmark.sample_size,
        config.benchmark.chunk_size,
        backends.join(", ")
    ));
    output.print_info(&format!(
        "Table {} maps {} fields",
        mapping.table,
        mapping.fields.len()
    ));
    Ok(())
}
