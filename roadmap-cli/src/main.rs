mod cli;
mod prompts;
mod render;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use colored::Colorize;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use roadmap_core::ai::{self, build_product_context, SUGGESTION_CHIPS};
use roadmap_core::catalog::{product_by_id, Product, TemplateKind};
use roadmap_core::export::{self, ExportFormat, ExportOptions};
use roadmap_core::import::{self, ColumnMapping, ImportField};
use roadmap_core::palette::{product_tone, quarter_tone, status_tone};
use roadmap_core::progress::{epic_progress, summarize};
use roadmap_core::timeline::{
    gantt_chart, portfolio_chart, quarter_board, sprint_board, Expansion,
};
use roadmap_core::{
    config_path, parse_calendar_date, AiClient, AiError, ChatSession, Config, Epic, EpicPatch,
    EpicStore, Module, Priority, Quarter, Storage, StoryPatch, StoryStatus, UserStory,
};

use crate::cli::{Cli, Command, EpicCommand, StoryCommand};
use crate::render::{tone_color, truncate};

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let env_filter =
        EnvFilter::try_from_env("ROADMAP_LOG").unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let app = App::load(&cli)?;
    debug!(data_dir = ?app.storage.data_dir(), year = app.year, "starting");

    match &cli.command {
        Command::Products => list_products(&app)?,
        Command::Use { product, clear } => select_product(product.as_deref(), *clear)?,
        Command::Epic(epic_cmd) => handle_epic_command(epic_cmd, &app)?,
        Command::Story(story_cmd) => handle_story_command(story_cmd, &app)?,
        Command::Import {
            file,
            mappings,
            interactive,
            dry_run,
        } => import_rows(&app, file, mappings, *interactive, *dry_run)?,
        Command::Timeline { expand } => show_timeline(&app, *expand)?,
        Command::Portfolio { expand } => show_portfolio(&app, *expand)?,
        Command::Sprints => show_sprints(&app)?,
        Command::Quarters => show_quarters(&app)?,
        Command::Stats => show_stats(&app)?,
        Command::Export {
            format,
            output,
            epics,
            no_acceptance_criteria,
            no_definition_of_done,
            stdout,
        } => {
            let options = ExportSelection {
                format,
                output: output.as_deref(),
                epics: epics.as_deref(),
                include_acceptance_criteria: !*no_acceptance_criteria,
                include_definition_of_done: !*no_definition_of_done,
                to_stdout: *stdout,
            };
            handle_export_command(&app, options)?;
        }
        Command::Generate {
            epics,
            prompt,
            yes,
        } => generate_stories(&app, epics.as_deref(), prompt.as_deref(), *yes)?,
        Command::Chat { message } => chat(&app, message.as_deref())?,
        Command::Config => show_config(&app)?,
        Command::Clear { yes } => clear_product(&app, *yes)?,
    }

    Ok(())
}

/// Resolved configuration, storage and selections for one invocation
struct App {
    config: Config,
    storage: Storage,
    product: Option<&'static Product>,
    year: i32,
}

impl App {
    fn load(cli: &Cli) -> Result<Self> {
        let config = Config::load_default()?;
        let product = match cli.product.as_deref() {
            Some(id) => Some(product_by_id(id).with_context(|| {
                format!("Unknown product '{}'. Run `roadmap products` to list them.", id)
            })?),
            None => config.default_product(),
        };

        Ok(Self {
            storage: Storage::from_config(&config),
            year: config.resolve_year(cli.year),
            product,
            config,
        })
    }

    fn product(&self) -> Result<&'static Product> {
        self.product
            .context("No product selected. Pass --product or run `roadmap use <product>`.")
    }

    fn load_epics(&self) -> Result<(&'static Product, Vec<Epic>)> {
        let product = self.product()?;
        let epics = self.storage.load(product.id)?;
        Ok((product, epics))
    }

    /// Runs `edit` against the product's store while holding the storage lock,
    /// then writes the result back. A failed edit leaves the file as it was.
    fn edit<T, F>(&self, edit: F) -> Result<T>
    where
        F: FnOnce(&mut EpicStore) -> Result<T>,
    {
        let product = self.product()?;
        edit_stored(&self.storage, product.id, edit)
    }
}

fn edit_stored<T, F>(storage: &Storage, product_id: &str, edit: F) -> Result<T>
where
    F: FnOnce(&mut EpicStore) -> Result<T>,
{
    let mut output = None;
    storage.update_atomically(product_id, |epics| {
        let mut store = EpicStore::with_epics(product_id, epics.clone());
        output = Some(edit(&mut store)?);
        *epics = store.epics().to_vec();
        Ok(())
    })?;
    output.context("Storage update did not run")
}

fn parse_quarter(s: &str) -> Result<Quarter> {
    Quarter::parse(s).with_context(|| format!("Invalid quarter: {}. Use Q1, Q2, Q3 or Q4.", s))
}

fn parse_status(s: &str) -> Result<StoryStatus> {
    StoryStatus::parse(s).with_context(|| {
        format!(
            "Invalid status: {}. Use Draft, Ready, \"In Progress\" or Done.",
            s
        )
    })
}

fn parse_priority(s: &str) -> Result<Priority> {
    Priority::parse(s)
        .with_context(|| format!("Invalid priority: {}. Use Must, Should, Could or Won't.", s))
}

fn parse_template(s: &str) -> Result<TemplateKind> {
    match s.trim().to_lowercase().as_str() {
        "feature" => Ok(TemplateKind::Feature),
        "technical" => Ok(TemplateKind::Technical),
        "documentation" | "docs" => Ok(TemplateKind::Documentation),
        _ => anyhow::bail!(
            "Unknown template: {}. Use feature, technical or documentation.",
            s
        ),
    }
}

fn parse_date(s: &str) -> Result<String> {
    let s = s.trim();
    if parse_calendar_date(s).is_none() {
        anyhow::bail!("Invalid date: {}. Use YYYY-MM-DD.", s);
    }
    Ok(s.to_string())
}

/// `Some("")` clears an optional field, `Some(v)` sets it, `None` leaves it
fn optional_change(value: &Option<String>) -> Option<Option<String>> {
    value.as_ref().map(|v| {
        let v = v.trim();
        (!v.is_empty()).then(|| v.to_string())
    })
}

/// Finds one item by full UUID, UUID prefix or case-insensitive title
fn find_by_key<'a, T>(
    items: &'a [T],
    key: &str,
    kind: &str,
    id_of: impl Fn(&T) -> Uuid,
    title_of: impl Fn(&T) -> &str,
) -> Result<&'a T> {
    let key = key.trim();
    if let Ok(id) = Uuid::parse_str(key) {
        return items
            .iter()
            .find(|item| id_of(*item) == id)
            .with_context(|| format!("{} not found: {}", kind, key));
    }

    let lower = key.to_lowercase();
    if let Some(item) = items.iter().find(|item| title_of(*item).to_lowercase() == lower) {
        return Ok(item);
    }

    let matches: Vec<&T> = items
        .iter()
        .filter(|item| !lower.is_empty() && id_of(*item).to_string().starts_with(&lower))
        .collect();
    match matches.as_slice() {
        [one] => Ok(*one),
        [] => anyhow::bail!("{} not found: {}", kind, key),
        _ => anyhow::bail!(
            "'{}' matches {} {}s. Use more of the UUID.",
            key,
            matches.len(),
            kind.to_lowercase()
        ),
    }
}

fn find_epic<'a>(epics: &'a [Epic], key: &str) -> Result<&'a Epic> {
    find_by_key(epics, key, "Epic", |e| e.id, |e| e.title.as_str())
}

fn find_story<'a>(epic: &'a Epic, key: &str) -> Result<&'a UserStory> {
    find_by_key(&epic.stories, key, "Story", |s| s.id, |s| s.title.as_str())
}

/// Resolves a comma-separated epic list into ids
fn resolve_epic_list(epics: &[Epic], list: &str) -> Result<Vec<Uuid>> {
    list.split(',')
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(|key| find_epic(epics, key).map(|e| e.id))
        .collect()
}

fn short_id(id: Uuid) -> String {
    id.to_string().chars().take(8).collect()
}

fn colored_status(status: StoryStatus) -> colored::ColoredString {
    status.to_string().color(tone_color(status_tone(status)))
}

fn colored_quarter(quarter: Quarter) -> colored::ColoredString {
    quarter.to_string().color(tone_color(quarter_tone(quarter)))
}

fn list_products(app: &App) -> Result<()> {
    let portfolio = app.storage.load_portfolio();
    let selected = app.product.map(|p| p.id);

    for entry in &portfolio {
        let product = entry.product;
        let marker = if selected == Some(product.id) { "*" } else { " " };
        println!(
            "{} {:<18} {} - {} ({} epics)",
            marker.green(),
            product.id.color(tone_color(product_tone(product.id))),
            product.name.bold(),
            product.description,
            entry.epics.len()
        );
        println!("    {}", product.sub_products.join(", ").bright_black());
    }

    Ok(())
}

fn select_product(product: Option<&str>, clear: bool) -> Result<()> {
    // Edit the file itself so environment overrides are not persisted
    let path = config_path()?;
    let mut config = Config::load(&path)?;

    if clear {
        config.clear_default_product();
        config.save(&path)?;
        println!("{}", "Default product cleared.".green());
        return Ok(());
    }

    let id = match product {
        Some(id) => id.to_string(),
        None => prompts::prompt_select_product()?.id.to_string(),
    };
    config.set_default_product(&id)?;
    config.save(&path)?;

    println!("{} {}", "Default product set to".green(), id.bold());
    Ok(())
}

fn handle_epic_command(cmd: &EpicCommand, app: &App) -> Result<()> {
    match cmd {
        EpicCommand::Add {
            title,
            quarter,
            sprint,
            description,
            customer,
            start,
            end,
            module,
            interactive,
        } => {
            let product = app.product()?;
            let epic = if *interactive || title.is_none() {
                prompts::prompt_new_epic(product.id)?
            } else {
                let title = title.clone().unwrap_or_default();
                let quarter = match quarter {
                    Some(q) => parse_quarter(q)?,
                    None => Quarter::Q1,
                };
                let mut epic = Epic::new(product.id, title, quarter);
                epic.description = description.clone().unwrap_or_default();
                epic.sprint = sprint.clone().unwrap_or_default();
                epic.customer = optional_change(customer).flatten();
                epic.start_date = start.as_deref().map(parse_date).transpose()?;
                epic.end_date = end.as_deref().map(parse_date).transpose()?;
                epic.module = module.as_deref().map(Module::parse);
                epic
            };

            let title = epic.title.clone();
            let id = app.edit(|store| Ok(store.add_epic(epic)))?;
            println!("{}", "Epic added successfully!".green());
            println!("UUID: {}", id);
            println!("Title: {}", title);
        }
        EpicCommand::List { quarter } => {
            let (product, mut epics) = app.load_epics()?;
            if let Some(q) = quarter {
                let quarter = parse_quarter(q)?;
                epics.retain(|e| e.quarter == quarter);
            }
            list_epics(product, &epics);
        }
        EpicCommand::Show { id } => {
            let (_, epics) = app.load_epics()?;
            show_epic(find_epic(&epics, id)?);
        }
        EpicCommand::Edit {
            id,
            title,
            quarter,
            sprint,
            description,
            customer,
            start,
            end,
            module,
        } => {
            let patch = EpicPatch {
                title: title.clone(),
                description: description.clone(),
                quarter: quarter.as_deref().map(parse_quarter).transpose()?,
                sprint: sprint.clone(),
                customer: optional_change(customer),
                start_date: optional_change(start)
                    .map(|d| d.as_deref().map(parse_date).transpose())
                    .transpose()?,
                end_date: optional_change(end)
                    .map(|d| d.as_deref().map(parse_date).transpose())
                    .transpose()?,
                module: optional_change(module).map(|m| m.as_deref().map(Module::parse)),
                dependencies: None,
            };

            let nothing_to_change = patch.title.is_none()
                && patch.description.is_none()
                && patch.quarter.is_none()
                && patch.sprint.is_none()
                && patch.customer.is_none()
                && patch.start_date.is_none()
                && patch.end_date.is_none()
                && patch.module.is_none();
            if nothing_to_change {
                anyhow::bail!("Nothing to change. Pass at least one field option.");
            }

            let title = app.edit(|store| {
                let epic_id = find_epic(store.epics(), id)?.id;
                store.update_epic(epic_id, patch)?;
                Ok(store.get(epic_id).map(|e| e.title.clone()).unwrap_or_default())
            })?;
            println!("{} {}", "Epic updated:".green(), title);
        }
        EpicCommand::Del { id, yes } => {
            let (_, epics) = app.load_epics()?;
            let epic = find_epic(&epics, id)?;
            let question = format!(
                "Delete epic '{}' and its {} stories?",
                epic.title,
                epic.stories.len()
            );
            if !*yes && !prompts::confirm(&question)? {
                println!("Deletion cancelled.");
                return Ok(());
            }

            let epic_id = epic.id;
            let removed = app.edit(|store| Ok(store.delete_epic(epic_id)?))?;
            println!("{} {}", "Epic deleted:".green(), removed.title);
        }
    }

    Ok(())
}

fn list_epics(product: &Product, epics: &[Epic]) {
    if epics.is_empty() {
        println!("{}", format!("No epics found for {}.", product.name).yellow());
        return;
    }

    println!(
        "{:<8} | {:<7} | {:<12} | {:<36} | {:>7} | {:>8}",
        "ID", "Quarter", "Sprint", "Title", "Stories", "Progress"
    );
    println!("{}", "-".repeat(95));

    for epic in epics {
        println!(
            "{:<8} | {:<7} | {:<12} | {:<36} | {:>7} | {:>7}%",
            short_id(epic.id),
            colored_quarter(epic.quarter),
            truncate(&epic.sprint, 12),
            truncate(&epic.title, 36),
            epic.stories.len(),
            epic_progress(epic)
        );
    }
}

fn show_epic(epic: &Epic) {
    println!("{}: {}", "ID".blue(), epic.id);
    println!("{}: {}", "Title".blue(), epic.title);
    println!("{}: {}", "Quarter".blue(), colored_quarter(epic.quarter));
    if !epic.sprint.is_empty() {
        println!("{}: {}", "Sprint".blue(), epic.sprint);
    }
    if let Some(customer) = &epic.customer {
        println!("{}: {}", "Customer".blue(), customer);
    }
    if let Some(module) = &epic.module {
        println!("{}: {}", "Module".blue(), module);
    }
    match (&epic.start_date, &epic.end_date) {
        (Some(start), Some(end)) => println!("{}: {} to {}", "Dates".blue(), start, end),
        (Some(start), None) => println!("{}: from {}", "Dates".blue(), start),
        _ => {}
    }
    println!("{}: {}%", "Progress".blue(), epic_progress(epic));
    println!("{}: {}", "Created".blue(), epic.created_at);
    println!("{}: {}", "Modified".blue(), epic.updated_at);

    if !epic.description.is_empty() {
        println!("\n{}:\n{}", "Description".blue(), epic.description);
    }

    if epic.stories.is_empty() {
        println!("\n{}", "No stories yet.".yellow());
        return;
    }

    println!("\n{} ({}):", "Stories".green(), epic.stories.len());
    for story in &epic.stories {
        println!(
            "  {} {} [{}] {} pts, {}",
            short_id(story.id).bright_black(),
            story.title.bold(),
            colored_status(story.status),
            story.story_points,
            story.priority
        );
        if !story.as_a.is_empty() || !story.i_want.is_empty() {
            println!("      {}", story.narrative().italic());
        }
        for criterion in &story.acceptance_criteria {
            println!("      - {}", criterion);
        }
    }
}

fn handle_story_command(cmd: &StoryCommand, app: &App) -> Result<()> {
    match cmd {
        StoryCommand::Add {
            epic,
            title,
            template,
            as_a,
            i_want,
            so_that,
            points,
            priority,
            interactive,
        } => {
            let (_, epics) = app.load_epics()?;
            let epic_id = find_epic(&epics, epic)?.id;

            let story = if *interactive || title.is_none() {
                prompts::prompt_new_story(epic_id)?
            } else {
                let mut story = UserStory::new(epic_id, title.clone().unwrap_or_default());
                if let Some(kind) = template.as_deref().map(parse_template).transpose()? {
                    let template = kind.template();
                    story.as_a = template.as_a.to_string();
                    story.acceptance_criteria = template
                        .acceptance_criteria
                        .iter()
                        .map(|s| s.to_string())
                        .collect();
                    story.definition_of_done = template
                        .definition_of_done
                        .iter()
                        .map(|s| s.to_string())
                        .collect();
                }
                if let Some(v) = as_a {
                    story.as_a = v.clone();
                }
                if let Some(v) = i_want {
                    story.i_want = v.clone();
                }
                if let Some(v) = so_that {
                    story.so_that = v.clone();
                }
                if let Some(p) = points {
                    story.story_points = *p;
                }
                if let Some(p) = priority {
                    story.priority = parse_priority(p)?;
                }
                story
            };

            let title = story.title.clone();
            let story_id = app.edit(|store| Ok(store.add_story(epic_id, story)?))?;
            println!("{}", "Story added successfully!".green());
            println!("UUID: {}", story_id);
            println!("Title: {}", title);
        }
        StoryCommand::Status {
            epic,
            story,
            status,
        } => {
            let status = parse_status(status)?;
            let title = app.edit(|store| {
                let epic = find_epic(store.epics(), epic)?;
                let (epic_id, story) = (epic.id, find_story(epic, story)?);
                let (story_id, title) = (story.id, story.title.clone());
                store.update_story(epic_id, story_id, StoryPatch::status(status))?;
                Ok(title)
            })?;
            println!("{} {} -> {}", "Status updated:".green(), title, colored_status(status));
        }
        StoryCommand::Del { epic, story, yes } => {
            let (_, epics) = app.load_epics()?;
            let epic = find_epic(&epics, epic)?;
            let story = find_story(epic, story)?;
            if !*yes && !prompts::confirm(&format!("Delete story '{}'?", story.title))? {
                println!("Deletion cancelled.");
                return Ok(());
            }

            let (epic_id, story_id) = (epic.id, story.id);
            let removed = app.edit(|store| Ok(store.delete_story(epic_id, story_id)?))?;
            println!("{} {}", "Story deleted:".green(), removed.title);
        }
    }

    Ok(())
}

fn parse_import_field(name: &str) -> Result<ImportField> {
    let name = name.trim();
    ImportField::ALL
        .into_iter()
        .find(|f| f.label().eq_ignore_ascii_case(name))
        .with_context(|| {
            let labels: Vec<&str> = ImportField::ALL.iter().map(|f| f.label()).collect();
            format!("Unknown field: {}. Fields: {}", name, labels.join(", "))
        })
}

/// Parses a `field=Header` override
fn parse_mapping_override(arg: &str) -> Result<(ImportField, String)> {
    let (field, header) = arg
        .split_once('=')
        .with_context(|| format!("Invalid mapping '{}'. Use field=Column Header.", arg))?;
    Ok((parse_import_field(field)?, header.trim().to_string()))
}

fn import_rows(
    app: &App,
    file: &Path,
    mappings: &[String],
    interactive: bool,
    dry_run: bool,
) -> Result<()> {
    let product = app.product()?;
    let content = fs::read_to_string(file)
        .with_context(|| format!("Failed to read import file: {:?}", file))?;
    let rows = import::parse_rows(&content)?;
    let headers = import::headers(&rows);

    let mut mapping = ColumnMapping::auto_map(&headers);
    for arg in mappings {
        let (field, header) = parse_mapping_override(arg)?;
        mapping.set(field, Some(header));
    }
    if interactive {
        for field in mapping.missing_required() {
            let column = prompts::prompt_map_column(field, &headers)?;
            mapping.set(field, column);
        }
    }

    println!("{}", "Column mapping:".blue());
    for field in ImportField::ALL {
        let column = match mapping.get(field) {
            Some(header) => header.normal(),
            None if field.is_required() => "(missing)".red(),
            None => "(none)".bright_black(),
        };
        println!("  {:<12} <- {}", field.label(), column);
    }

    let items = import::rows_to_items(&rows, &mapping)?;

    if dry_run {
        let epics = import::group_into_epics(&items, product.id, Utc::now());
        println!(
            "\n{} rows would create {} epics in {}:",
            items.len(),
            epics.len(),
            product.name
        );
        for epic in &epics {
            println!("  [{}] {}", colored_quarter(epic.quarter), epic.title);
        }
        return Ok(());
    }

    let created = app.edit(|store| Ok(store.import_items(&items)))?;
    println!(
        "{} {} rows imported as {} epics into {}.",
        "Success:".green(),
        items.len(),
        created,
        product.name
    );
    Ok(())
}

fn show_timeline(app: &App, expand: bool) -> Result<()> {
    let (product, epics) = app.load_epics()?;
    let chart = gantt_chart(&epics, app.year);

    println!("{} {}", product.name.bold(), chart.header.year);
    for line in render::header_lines(&chart.header) {
        println!("{}", line);
    }

    if chart.rows.is_empty() {
        println!("{}", "No epics yet. Add one with `roadmap epic add`.".yellow());
        return Ok(());
    }

    let mut expansion = Expansion::new();
    if expand {
        for row in &chart.rows {
            expansion.toggle_epic(row.epic_id);
        }
    }

    let today = chart.header.today;
    for row in &chart.rows {
        println!("{}", render::epic_line(row, today));
        for story in row.visible_stories(&expansion) {
            println!("{}", render::story_line(story, today));
        }
    }

    Ok(())
}

fn show_portfolio(app: &App, expand: bool) -> Result<()> {
    let products = app.storage.load_portfolio();
    let chart = portfolio_chart(&products, app.year);

    let mut expansion = Expansion::new();
    if expand {
        expansion.expand_all(&chart);
    } else if let Some(product) = app.product {
        expansion.toggle_product(product.id);
    }

    println!("{} {}", "Portfolio".bold(), chart.header.year);
    for line in render::header_lines(&chart.header) {
        println!("{}", line);
    }

    let today = chart.header.today;
    for lane in &chart.lanes {
        println!(
            "{} {}",
            lane.name.color(tone_color(lane.tone)).bold(),
            format!("({} epics, {} stories)", lane.epic_count, lane.story_count).bright_black()
        );
        if !expansion.is_product_expanded(lane.product_id) {
            continue;
        }
        for row in &lane.rows {
            println!("{}", render::epic_line(row, today));
            for story in row.visible_stories(&expansion) {
                println!("{}", render::story_line(story, today));
            }
        }
    }

    println!(
        "\n{} epics, {} stories, {} done",
        chart.total_epics, chart.total_stories, chart.completed_stories
    );
    Ok(())
}

const SPRINT_CELL: usize = 14;

fn show_sprints(app: &App) -> Result<()> {
    let (product, epics) = app.load_epics()?;
    let board = sprint_board(&epics);

    println!("{} sprints", product.name.bold());
    let header: String = board
        .columns
        .iter()
        .map(|c| format!("{:<width$}", truncate(&c.label, SPRINT_CELL - 1), width = SPRINT_CELL))
        .collect();
    println!("{:<width$} {}", "", header.bold(), width = render::LABEL_WIDTH);

    let mut unscheduled = Vec::new();
    for row in &board.rows {
        let Some(column) = row.column else {
            unscheduled.push(row);
            continue;
        };
        let cells: String = (0..board.columns.len())
            .map(|i| {
                let cell = if i == column {
                    format!("■ {} stories", row.story_count)
                } else {
                    "·".to_string()
                };
                format!("{:<width$}", cell, width = SPRINT_CELL)
            })
            .collect();
        println!(
            "{:<width$} {}",
            truncate(&row.title, render::LABEL_WIDTH),
            cells.color(tone_color(row.tone)),
            width = render::LABEL_WIDTH
        );
    }

    if !unscheduled.is_empty() {
        println!("\n{}", "Without sprint:".yellow());
        for row in unscheduled {
            println!("  [{}] {}", colored_quarter(row.quarter), row.title);
        }
    }

    Ok(())
}

fn show_quarters(app: &App) -> Result<()> {
    let (product, epics) = app.load_epics()?;
    println!("{} {}", product.name.bold(), app.year);

    for bucket in quarter_board(&epics) {
        println!(
            "\n{} ({} epics)",
            bucket.quarter.to_string().color(tone_color(bucket.tone)).bold(),
            bucket.epics.len()
        );
        for epic in &bucket.epics {
            let sprint = if epic.sprint.is_empty() {
                String::new()
            } else {
                format!(" [{}]", epic.sprint)
            };
            println!(
                "  • {}{} {}",
                epic.title,
                sprint.bright_black(),
                format!("{} stories, {}%", epic.stories.len(), epic_progress(epic)).bright_black()
            );
        }
    }

    Ok(())
}

fn show_stats(app: &App) -> Result<()> {
    let (product, epics) = app.load_epics()?;
    let summary = summarize(&epics);

    println!("{}", product.name.bold());
    println!("{}: {}", "Epics".blue(), summary.epic_count);
    println!("{}: {}", "Stories".blue(), summary.story_count);
    println!("{}: {}", "Story points".blue(), summary.story_points);
    println!(
        "{}: {}% ({} of {} done)",
        "Completion".blue(),
        summary.completion,
        summary.done_count,
        summary.story_count
    );

    println!("\n{}:", "By status".green());
    for status in StoryStatus::ALL {
        let count = summary.status_counts.get(&status).copied().unwrap_or(0);
        println!("  {:<12} {}", colored_status(status), count);
    }

    println!("\n{}:", "By quarter".green());
    for quarter in Quarter::ALL {
        let count = summary.quarter_counts.get(&quarter).copied().unwrap_or(0);
        println!("  {:<12} {}", colored_quarter(quarter), count);
    }

    println!("\n{}: {}", "Stakeholders".green(), summary.stakeholder_count);
    for customer in &summary.customers {
        println!("  {}", customer);
    }

    Ok(())
}

struct ExportSelection<'a> {
    format: &'a str,
    output: Option<&'a Path>,
    epics: Option<&'a str>,
    include_acceptance_criteria: bool,
    include_definition_of_done: bool,
    to_stdout: bool,
}

fn handle_export_command(app: &App, selection: ExportSelection<'_>) -> Result<()> {
    let format = ExportFormat::from_id(selection.format).with_context(|| {
        let ids: Vec<&str> = ExportFormat::ALL.iter().map(|f| f.id()).collect();
        format!(
            "Unknown export format: {}. Supported formats: {}",
            selection.format,
            ids.join(", ")
        )
    })?;

    let (_, epics) = app.load_epics()?;
    let epic_ids = match selection.epics {
        Some(list) => resolve_epic_list(&epics, list)?,
        None => Vec::new(),
    };
    let options = ExportOptions {
        include_acceptance_criteria: selection.include_acceptance_criteria,
        include_definition_of_done: selection.include_definition_of_done,
        epic_ids,
    };

    if export::story_count(&epics, &options) == 0 {
        anyhow::bail!("No stories to export. Add or generate stories first.");
    }

    if selection.to_stdout {
        print!("{}", export::export(&epics, format, &options)?);
        return Ok(());
    }

    let path = selection
        .output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(format.file_name()));
    let count = export::export_to_file(&epics, format, &options, &path)?;
    println!(
        "{} {} stories to {} ({})",
        "Exported".green(),
        count,
        path.display(),
        format.name()
    );
    Ok(())
}

fn ai_client(app: &App) -> Result<AiClient> {
    let client = AiClient::from_config(&app.config);
    if !client.is_available() {
        return Err(AiError::NotConfigured.into());
    }
    Ok(client)
}

fn generate_stories(
    app: &App,
    epic_list: Option<&str>,
    custom_prompt: Option<&str>,
    yes: bool,
) -> Result<()> {
    let client = ai_client(app)?;
    let (product, epics) = app.load_epics()?;

    let targets = match epic_list {
        Some(list) => ai::select_epics(&epics, &resolve_epic_list(&epics, list)?),
        None => ai::epics_without_stories(&epics),
    };
    if targets.is_empty() {
        anyhow::bail!(
            "Every epic in {} already has stories. Pass --epics to pick epics explicitly.",
            product.name
        );
    }

    println!(
        "Generating stories for {} epics with {}",
        targets.len(),
        client.mode_description()
    );
    let outcome = ai::generate_batch(&client, &targets, custom_prompt, |fraction: f64, epic: &Epic| {
        eprint!(
            "\r[{:>3}%] {:<50}",
            (fraction * 100.0).round() as u32,
            truncate(&epic.title, 50)
        );
        let _ = io::stderr().flush();
    });
    eprintln!();

    for draft in &outcome.drafts {
        println!("\n{} ({} stories)", draft.epic_title.bold(), draft.stories.len());
        for story in &draft.stories {
            println!(
                "  - {} {}",
                story.title,
                format!("{} pts, {}", story.story_points, story.priority).bright_black()
            );
        }
    }

    if let Some((epic_id, error)) = &outcome.halted {
        let title = epics
            .iter()
            .find(|e| e.id == *epic_id)
            .map(|e| e.title.as_str())
            .unwrap_or("unknown epic");
        eprintln!("{} '{}': {}", "Generation stopped at".red(), title, error);
    }

    if outcome.drafts.is_empty() {
        anyhow::bail!("No stories were generated.");
    }

    let question = format!(
        "Save {} stories to {} epics?",
        outcome.story_count(),
        outcome.drafts.len()
    );
    if !yes && !prompts::confirm(&question)? {
        println!("Generated stories discarded.");
        return Ok(());
    }

    let saved = app.edit(|store| Ok(outcome.save_into(store)?))?;
    println!("{} {} stories saved.", "Success:".green(), saved);
    Ok(())
}

fn ask(
    client: &AiClient,
    session: &mut ChatSession,
    product_context: &str,
    question: &str,
) -> Result<()> {
    session.send(client, question, product_context, |delta: &str| {
        print!("{}", delta);
        let _ = io::stdout().flush();
    })?;
    println!();
    Ok(())
}

fn chat(app: &App, message: Option<&str>) -> Result<()> {
    let client = ai_client(app)?;
    let (product, epics) = app.load_epics()?;
    let product_context = build_product_context(product.id, &epics);
    let mut session = ChatSession::new();

    if let Some(question) = message {
        return ask(&client, &mut session, &product_context, question);
    }

    println!(
        "{} for {} ({} epics). Suggestions:",
        "Roadmap assistant".bold(),
        product.name,
        epics.len()
    );
    for (i, chip) in SUGGESTION_CHIPS.iter().enumerate() {
        println!("  {}. {}", i + 1, chip);
    }

    while let Some(input) = prompts::prompt_chat_input()? {
        let input = input.trim();
        match input {
            "" => continue,
            "/quit" | "/exit" => break,
            "/clear" => {
                session.clear();
                println!("{}", "Conversation cleared.".bright_black());
                continue;
            }
            _ => {}
        }

        let question = match input.parse::<usize>() {
            Ok(n) if (1..=SUGGESTION_CHIPS.len()).contains(&n) => SUGGESTION_CHIPS[n - 1],
            _ => input,
        };
        if let Err(e) = ask(&client, &mut session, &product_context, question) {
            eprintln!("{} {}", "Error:".red(), e);
        }
    }

    Ok(())
}

fn show_config(app: &App) -> Result<()> {
    println!("{}: {}", "Config file".blue(), config_path()?.display());
    println!("{}: {}", "Data directory".blue(), app.config.data_dir.display());
    println!("{}: {}", "Key prefix".blue(), app.config.key_prefix);
    println!(
        "{}: {}",
        "Default product".blue(),
        app.config.default_product.as_deref().unwrap_or("(none)")
    );
    println!("{}: {}", "Year".blue(), app.year);
    println!(
        "{}: {}",
        "AI".blue(),
        AiClient::from_config(&app.config).mode_description()
    );
    Ok(())
}

fn clear_product(app: &App, yes: bool) -> Result<()> {
    let product = app.product()?;
    let question = format!("Delete all epics and stories of {}?", product.name);
    if !yes && !prompts::confirm(&question)? {
        println!("Clear cancelled.");
        return Ok(());
    }

    app.storage.clear(product.id)?;
    println!("{} {}", "Cleared".green(), product.name);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_epics() -> Vec<Epic> {
        let mut a = Epic::new("horizon", "Regime Detection".into(), Quarter::Q1);
        a.stories.push(UserStory::new(a.id, "Label regimes".into()));
        let b = Epic::new("horizon", "Risk Engine".into(), Quarter::Q2);
        vec![a, b]
    }

    #[test]
    fn test_find_epic_by_title_and_uuid() {
        let epics = sample_epics();
        assert_eq!(find_epic(&epics, "risk engine").unwrap().id, epics[1].id);
        assert_eq!(
            find_epic(&epics, &epics[0].id.to_string()).unwrap().id,
            epics[0].id
        );
        let prefix: String = epics[0].id.to_string().chars().take(8).collect();
        assert_eq!(find_epic(&epics, &prefix).unwrap().id, epics[0].id);
    }

    #[test]
    fn test_find_epic_misses() {
        let epics = sample_epics();
        assert!(find_epic(&epics, "Pricing").is_err());
        assert!(find_epic(&epics, &Uuid::new_v4().to_string()).is_err());
        assert!(find_epic(&epics, "").is_err());
    }

    #[test]
    fn test_find_story() {
        let epics = sample_epics();
        let story = find_story(&epics[0], "LABEL REGIMES").unwrap();
        assert_eq!(story.id, epics[0].stories[0].id);
        assert!(find_story(&epics[1], "Label regimes").is_err());
    }

    #[test]
    fn test_resolve_epic_list() {
        let epics = sample_epics();
        let ids = resolve_epic_list(&epics, "Risk Engine, Regime Detection,").unwrap();
        assert_eq!(ids, vec![epics[1].id, epics[0].id]);
        assert!(resolve_epic_list(&epics, "Risk Engine, Nope").is_err());
    }

    #[test]
    fn test_parse_helpers() {
        assert_eq!(parse_quarter("q3").unwrap(), Quarter::Q3);
        assert!(parse_quarter("Q5").is_err());
        assert_eq!(parse_status("in progress").unwrap(), StoryStatus::InProgress);
        assert!(parse_status("blocked").is_err());
        assert_eq!(parse_priority("won't").unwrap(), Priority::Wont);
        assert_eq!(parse_template("Docs").unwrap(), TemplateKind::Documentation);
        assert!(parse_template("epic").is_err());
        assert_eq!(parse_date(" 2026-04-01 ").unwrap(), "2026-04-01");
        assert!(parse_date("next week").is_err());
    }

    #[test]
    fn test_optional_change() {
        assert_eq!(optional_change(&None), None);
        assert_eq!(optional_change(&Some("  ".into())), Some(None));
        assert_eq!(
            optional_change(&Some(" Acme ".into())),
            Some(Some("Acme".to_string()))
        );
    }

    #[test]
    fn test_parse_mapping_override() {
        let (field, header) = parse_mapping_override("startDate= Kick-off").unwrap();
        assert_eq!(field, ImportField::StartDate);
        assert_eq!(header, "Kick-off");

        assert_eq!(
            parse_mapping_override("EPIC=Initiative").unwrap().0,
            ImportField::Epic
        );
        assert!(parse_mapping_override("epic").is_err());
        assert!(parse_mapping_override("owner=Owner").is_err());
    }

    #[test]
    fn test_failed_edit_is_not_written() {
        let dir = tempfile::TempDir::new().unwrap();
        let storage = Storage::new(dir.path(), "roadmap-epics");
        let epics = sample_epics();
        storage.save("horizon", &epics).unwrap();

        let result: Result<()> = edit_stored(&storage, "horizon", |store| {
            store.add_story(epics[1].id, UserStory::new(epics[1].id, "Stress tests".into()))?;
            store.delete_story(epics[1].id, Uuid::new_v4())?;
            Ok(())
        });

        assert!(result.is_err());
        let stored = storage.load("horizon").unwrap();
        assert!(stored[1].stories.is_empty());
    }

    #[test]
    fn test_successful_edit_is_written() {
        let dir = tempfile::TempDir::new().unwrap();
        let storage = Storage::new(dir.path(), "roadmap-epics");
        let epics = sample_epics();
        storage.save("horizon", &epics).unwrap();

        let id = edit_stored(&storage, "horizon", |store| {
            Ok(store.add_story(epics[1].id, UserStory::new(epics[1].id, "Stress tests".into()))?)
        })
        .unwrap();

        let stored = storage.load("horizon").unwrap();
        assert_eq!(stored[1].stories[0].id, id);
    }
}
