//! List command implementation

use std::sync::Arc;

use crate::cli::display::Display;
use crate::core::{Config, PostureResult};
use crate::engine::CheckRegistry;
use crate::probes::{PathLocator, ToolLocator};

/// Handle the list command
pub fn handle(config: &Config, display: &Display) -> PostureResult<()> {
    let tools = Arc::new(PathLocator::from_env());
    let registry = CheckRegistry::from_config(config, tools.clone())?;

    for section in registry.sections() {
        display.section_header(&display.section_title(section));

        let rows: Vec<Vec<String>> = registry
            .list_probes()
            .iter()
            .filter(|p| p.section() == section)
            .map(|p| {
                let requires = match p.required_tools() {
                    [] => "-".to_string(),
                    required => {
                        let joined = required.join(" | ");
                        match tools.missing_requirement(required) {
                            Some(_) => format!("{} (missing)", joined),
                            None => joined,
                        }
                    }
                };
                vec![
                    p.id().to_string(),
                    p.label().to_string(),
                    format!("{}s", p.timeout().as_secs_f64()),
                    requires,
                ]
            })
            .collect();

        display.table(&["Id", "Label", "Timeout", "Requires"], &rows);
    }

    if !config.probes.disabled.is_empty() {
        display.info(&format!("Disabled: {}", config.probes.disabled.join(", ")));
    }
    Ok(())
}
