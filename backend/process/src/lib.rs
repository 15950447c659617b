//! # Seed Import
//!
//! Turns a JSON seed into the protobuf bank the server loads.
//!
//! ## Seed format
//! The JSON shape of [`bank::Bank`], camelCase, every field optional:
//! `recipes`, `categoryGroups`, `cookingLogs`, `profiles`, `favorites`.
//!
//! ## Cleanup
//! 1. Every id (groups, options, recipes, users) becomes a lower-case slug.
//! 2. Options with an empty slug, or already claimed by an earlier group, are dropped.
//! 3. Recipes with an empty or repeated slug are dropped.
//! 4. Recipe category references to unknown options are dropped.
//! 5. Cooking logs and favorites pointing at unknown recipes are dropped.
//!
//! ## Notes
//! - Build with `--features verbose` to print every dropped record.
//! - The category kind is left as is, the server rejects unknown kinds at load.
use std::{
    collections::HashSet,
    fmt::{self, Display},
    fs,
    path::Path,
};

use anyhow::{Context, Error};
use bank::{Bank, write_bank};
use indicatif::{ProgressBar, ProgressStyle};

pub mod utils;

use utils::{slug, slug_all};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Report {
    pub recipes: usize,
    pub options: usize,
    pub cooking_logs: usize,
    pub favorites: usize,
    pub dropped_options: usize,
    pub dropped_recipes: usize,
    pub dropped_categories: usize,
    pub dropped_logs: usize,
    pub dropped_favorites: usize,
}

impl Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Recipes: {} ({} dropped)", self.recipes, self.dropped_recipes)?;
        writeln!(f, "Options: {} ({} dropped)", self.options, self.dropped_options)?;
        writeln!(f, "Category references dropped: {}", self.dropped_categories)?;
        writeln!(f, "Cooking logs: {} ({} dropped)", self.cooking_logs, self.dropped_logs)?;
        write!(f, "Favorites: {} ({} dropped)", self.favorites, self.dropped_favorites)
    }
}

pub fn read_seed(path: &Path) -> Result<Bank, Error> {
    let json = fs::read_to_string(path).with_context(|| format!("Failed to read seed at {}", path.display()))?;

    serde_json::from_str(&json).with_context(|| format!("Malformed seed at {}", path.display()))
}

pub fn import(seed: &Path, output: &Path) -> Result<Report, Error> {
    let mut bank = read_seed(seed)?;

    let pb = ProgressBar::new(records(&bank));
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("=> "),
    );

    let report = sanitize_bank(&mut bank, &pb);
    pb.finish_with_message("Done");

    write_bank(output, &bank)?;

    Ok(report)
}

fn records(bank: &Bank) -> u64 {
    (bank.category_groups.len() + bank.recipes.len() + bank.cooking_logs.len() + bank.favorites.len()) as u64
}

pub fn sanitize_bank(bank: &mut Bank, pb: &ProgressBar) -> Report {
    let mut report = Report::default();

    pb.set_message("Categories");
    let mut group_ids = HashSet::new();
    let mut option_ids = HashSet::new();
    bank.category_groups.retain_mut(|group| {
        pb.inc(1);

        group.id = slug(&group.id);
        if group.id.is_empty() || !group_ids.insert(group.id.clone()) {
            report.dropped_options += group.options.len();
            return false;
        }

        let before = group.options.len();
        group.options.retain_mut(|option| {
            option.id = slug(&option.id);
            !option.id.is_empty() && option_ids.insert(option.id.clone())
        });
        report.dropped_options += before - group.options.len();

        true
    });
    report.options = bank.category_groups.iter().map(|group| group.options.len()).sum();

    pb.set_message("Recipes");
    let mut recipe_ids = HashSet::new();
    let before = bank.recipes.len();
    bank.recipes.retain_mut(|recipe| {
        pb.inc(1);

        recipe.id = slug(&recipe.id);
        recipe.author_id = slug(&recipe.author_id);

        let categories = slug_all(&recipe.category_ids);
        let known: Vec<String> = categories.into_iter().filter(|id| option_ids.contains(id)).collect();
        report.dropped_categories += recipe.category_ids.len() - known.len();
        recipe.category_ids = known;

        let keep = !recipe.id.is_empty() && recipe_ids.insert(recipe.id.clone());

        #[cfg(feature = "verbose")]
        if !keep {
            println!("Dropping recipe {:?}", recipe.title);
        }

        keep
    });
    report.dropped_recipes = before - bank.recipes.len();
    report.recipes = bank.recipes.len();

    for profile in &mut bank.profiles {
        profile.id = slug(&profile.id);
    }
    bank.profiles.retain(|profile| !profile.id.is_empty());

    pb.set_message("Cooking logs");
    let before = bank.cooking_logs.len();
    bank.cooking_logs.retain_mut(|log| {
        pb.inc(1);

        log.user_id = slug(&log.user_id);
        log.recipe_id = slug(&log.recipe_id);

        let keep = !log.user_id.is_empty() && recipe_ids.contains(&log.recipe_id);

        #[cfg(feature = "verbose")]
        if !keep {
            println!("Dropping cooking log of {:?} by {:?}", log.recipe_id, log.user_id);
        }

        keep
    });
    report.dropped_logs = before - bank.cooking_logs.len();
    report.cooking_logs = bank.cooking_logs.len();

    pb.set_message("Favorites");
    let before = bank.favorites.len();
    bank.favorites.retain_mut(|favorite| {
        pb.inc(1);

        favorite.user_id = slug(&favorite.user_id);
        favorite.recipe_id = slug(&favorite.recipe_id);

        !favorite.user_id.is_empty() && recipe_ids.contains(&favorite.recipe_id)
    });
    report.dropped_favorites = before - bank.favorites.len();
    report.favorites = bank.favorites.len();

    report
}
