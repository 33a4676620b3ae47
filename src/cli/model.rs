//! Model command - validate an artifact

use anyhow::{Context, Result};
use console::style;
use snowcast::features::{FEATURE_COUNT, FEATURE_NAMES};
use snowcast::scoring::{EnsembleModel, QualityCutoffs};
use std::path::Path;

pub fn run(path: &Path) -> Result<()> {
    let model = EnsembleModel::load(path).with_context(|| format!("Invalid model {}", path.display()))?;

    println!("\n{} {}\n", style("Model").bold(), style(path.display()).cyan());
    println!("  Version:  {}", model.version().unwrap_or("unversioned"));
    println!("  Members:  {}", model.member_count());
    println!("  Shape:    {} -> {} -> 1", model.input_size(), model.hidden_size());

    if model.input_size() == FEATURE_COUNT {
        println!(
            "  {} Input size matches the {} engineered features",
            style("[OK]").green(),
            FEATURE_COUNT
        );
    } else {
        println!(
            "  {} Expects {} inputs but {} features are produced; scoring will use the heuristic",
            style("[!!]").yellow(),
            model.input_size(),
            FEATURE_COUNT
        );
        println!("      first feature {}, last {}", FEATURE_NAMES[0], FEATURE_NAMES[FEATURE_COUNT - 1]);
    }

    if *model.quality_thresholds() != QualityCutoffs::default() {
        println!(
            "  {} Embedded quality thresholds differ from the built-in cutoffs and are ignored",
            style("[--]").dim()
        );
    }
    println!();
    Ok(())
}
