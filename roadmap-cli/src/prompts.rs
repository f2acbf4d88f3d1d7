use anyhow::Result;
use inquire::validator::Validation;
use inquire::{Confirm, CustomType, InquireError, Select, Text};
use uuid::Uuid;

use roadmap_core::catalog::{Product, TemplateKind, PRODUCTS};
use roadmap_core::import::ImportField;
use roadmap_core::{parse_calendar_date, Epic, Module, Priority, Quarter, UserStory};

const NO_MODULE: &str = "(none)";
const CUSTOM_MODULE: &str = "Other...";
const SKIP_COLUMN: &str = "(skip)";

/// Prompts the user to pick a catalog product
pub fn prompt_select_product() -> Result<&'static Product> {
    let options: Vec<String> = PRODUCTS
        .iter()
        .map(|p| format!("{} - {}", p.name, p.description))
        .collect();

    let selection = Select::new("Select a product:", options).raw_prompt()?;
    Ok(&PRODUCTS[selection.index])
}

fn optional_text(message: &str) -> Result<Option<String>> {
    let value = Text::new(message).prompt()?;
    let value = value.trim();
    Ok((!value.is_empty()).then(|| value.to_string()))
}

fn optional_date(message: &str) -> Result<Option<String>> {
    let value = Text::new(message)
        .with_help_message("YYYY-MM-DD, leave empty to use the quarter")
        .with_validator(|input: &str| {
            if input.trim().is_empty() || parse_calendar_date(input).is_some() {
                Ok(Validation::Valid)
            } else {
                Ok(Validation::Invalid("Expected a date like 2026-04-01".into()))
            }
        })
        .prompt()?;
    let value = value.trim();
    Ok((!value.is_empty()).then(|| value.to_string()))
}

fn prompt_module() -> Result<Option<Module>> {
    let mut options = vec![NO_MODULE.to_string()];
    options.extend(
        [
            Module::Model,
            Module::Pipeline,
            Module::Containers,
            Module::Release,
            Module::Documentation,
        ]
        .iter()
        .map(Module::to_string),
    );
    options.push(CUSTOM_MODULE.to_string());

    let selection = Select::new("Module:", options).prompt()?;
    match selection.as_str() {
        NO_MODULE => Ok(None),
        CUSTOM_MODULE => Ok(optional_text("Module name:")?.map(|m| Module::parse(&m))),
        other => Ok(Some(Module::parse(other))),
    }
}

/// Prompts the user for a new epic under `product_id`
pub fn prompt_new_epic(product_id: &str) -> Result<Epic> {
    let title = Text::new("Title:")
        .with_validator(|input: &str| {
            if input.trim().is_empty() {
                Ok(Validation::Invalid("Title is required".into()))
            } else {
                Ok(Validation::Valid)
            }
        })
        .prompt()?;

    let quarter = Select::new("Quarter:", Quarter::ALL.to_vec()).prompt()?;
    let mut epic = Epic::new(product_id, title.trim().to_string(), quarter);

    epic.description = inquire::Editor::new("Description:").prompt()?;
    epic.sprint = Text::new("Sprint:").prompt()?.trim().to_string();
    epic.customer = optional_text("Customer:")?;
    epic.start_date = optional_date("Start date:")?;
    if epic.start_date.is_some() {
        epic.end_date = optional_date("End date:")?;
    }
    epic.module = prompt_module()?;

    Ok(epic)
}

/// Prompts the user for a new story, pre-filled from a template
pub fn prompt_new_story(epic_id: Uuid) -> Result<UserStory> {
    let kind = Select::new("Template:", TemplateKind::ALL.to_vec()).prompt()?;
    let template = kind.template();

    let title = Text::new("Title:").prompt()?;
    let mut story = UserStory::new(epic_id, title.trim().to_string());

    story.as_a = Text::new("As a:")
        .with_default(template.as_a)
        .prompt()?;
    story.i_want = Text::new("I want:")
        .with_initial_value(&format!("{} ", template.i_want_prefix))
        .prompt()?
        .trim()
        .to_string();
    story.so_that = Text::new("So that:")
        .with_initial_value(&format!("{} ", template.so_that_prefix))
        .prompt()?
        .trim()
        .to_string();

    story.story_points = CustomType::<u32>::new("Story points:")
        .with_default(story.story_points)
        .with_error_message("Please enter a whole number")
        .prompt()?;
    story.priority = Select::new("Priority:", Priority::ALL.to_vec())
        .with_starting_cursor(1)
        .prompt()?;

    if Confirm::new("Use the template's acceptance criteria and definition of done?")
        .with_default(true)
        .prompt()?
    {
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

    let tags_input = Text::new("Tags (comma separated):").prompt()?;
    story.tags = tags_input
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    Ok(story)
}

/// Prompts the user to select an epic from a list
pub fn prompt_select_epic(epics: &[Epic]) -> Result<Uuid> {
    if epics.is_empty() {
        anyhow::bail!("No epics found for this product");
    }

    let options: Vec<String> = epics
        .iter()
        .map(|e| format!("[{}] {}", e.quarter, e.title))
        .collect();

    let selection = Select::new("Select an epic:", options).raw_prompt()?;
    Ok(epics[selection.index].id)
}

/// Prompts for the column that feeds `field`; `None` leaves it unmapped
pub fn prompt_map_column(field: ImportField, headers: &[String]) -> Result<Option<String>> {
    let mut options = vec![SKIP_COLUMN.to_string()];
    options.extend(headers.iter().cloned());

    let message = format!("Column for '{}':", field);
    let selection = Select::new(&message, options).prompt()?;
    Ok((selection != SKIP_COLUMN).then_some(selection))
}

pub fn confirm(message: &str) -> Result<bool> {
    Ok(Confirm::new(message).with_default(false).prompt()?)
}

/// Reads one chat turn; `None` when the user cancels with Esc or Ctrl-C
pub fn prompt_chat_input() -> Result<Option<String>> {
    match Text::new("You:")
        .with_help_message("number picks a suggestion, /clear resets, Esc quits")
        .prompt()
    {
        Ok(input) => Ok(Some(input)),
        Err(InquireError::OperationCanceled) | Err(InquireError::OperationInterrupted) => Ok(None),
        Err(e) => Err(e.into()),
    }
}
