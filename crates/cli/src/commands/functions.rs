//! `skein functions`: list registered functions.

use skein_config::SkeinConfig;
use skein_core::FunctionRegistry;
use skein_planner::FunctionFilter;
use skein_planner::functions::function_manuals;

pub fn run(json: bool, exclude_plugins: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    let config = SkeinConfig::load()?;
    let registry = skein_plugins::core_registry()?;

    let mut filter = FunctionFilter::from_config(&config.planner);
    for plugin in exclude_plugins {
        filter = filter.exclude_plugin(plugin);
    }

    println!("{}", listing(&registry, &filter, json)?);
    Ok(())
}

fn listing(
    registry: &FunctionRegistry,
    filter: &FunctionFilter,
    json: bool,
) -> Result<String, serde_json::Error> {
    let functions = filter.available(registry);
    if json {
        let definitions: Vec<_> = functions.iter().map(|f| f.to_definition()).collect();
        serde_json::to_string_pretty(&definitions)
    } else {
        Ok(function_manuals(&functions))
    }
}
