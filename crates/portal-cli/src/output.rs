//! Terminal rendering for command results.

use anyhow::Result;
use serde::Serialize;

use portal_core::auth::SessionData;
use portal_core::models::{
    field_label, DepartmentListResponse, Event, RegistrationFormSchema, RegistrationListResponse,
    RegistrationStatus, RegistrationWithFiles, StatusCounts, User, UserListResponse,
    YearsResponse,
};
use portal_core::utils::{format_field_value, timezone, truncate_string};

/// Column width for titles and names in list output
const NAME_WIDTH: usize = 32;

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn print_user(json: bool, user: &User, session: Option<&SessionData>) -> Result<()> {
    if json {
        return print_json(user);
    }
    println!("{} <{}>", user.display_name(), user.email);
    println!("  Role:       {} ({})", user.display_role, user.role);
    if let Some(ref department) = user.department_id {
        println!("  Department: {}", department);
    }
    if let Some(ref linkedin) = user.linkedin_url {
        println!("  LinkedIn:   {}", linkedin);
    }
    if let Some(session) = session {
        println!("  Session:    expires in {} min", session.minutes_until_expiry());
    }
    Ok(())
}

pub fn print_events(json: bool, events: &[Event]) -> Result<()> {
    if json {
        return print_json(events);
    }
    if events.is_empty() {
        println!("No events.");
        return Ok(());
    }
    for event in events {
        println!(
            "{:<38} {:<width$} {:<17} {}",
            event.id,
            truncate_string(&event.title, NAME_WIDTH),
            event.status.to_string(),
            timezone::format_in_toronto(&event.date_time, "%Y-%m-%d %-I:%M %p")
                .unwrap_or_else(|| event.date_time.clone()),
            width = NAME_WIDTH
        );
    }
    Ok(())
}

pub fn print_event(json: bool, event: &Event) -> Result<()> {
    if json {
        return print_json(event);
    }
    println!("{}  [{}]", event.title, event.status);
    println!("  When:     {}", event.formatted_date_time());
    println!("  Where:    {}", event.location_display());
    if let Some(deadline) = event.formatted_deadline() {
        println!("  Deadline: {}", deadline);
    }
    if let Some(capacity) = event.max_capacity {
        println!("  Capacity: {}", capacity);
    }
    if let Some(ref category) = event.category {
        println!("  Category: {}", category);
    }
    if let Some(ref description) = event.description {
        println!("\n{}", description);
    }
    let schema = event
        .registration_form_schema
        .as_ref()
        .and_then(RegistrationFormSchema::from_value);
    if let Some(schema) = schema.filter(|s| !s.fields.is_empty()) {
        println!("\nRegistration form:");
        for field in &schema.fields {
            let required = if field.required { " *" } else { "" };
            println!("  {} ({}){}", field.label, field.field_type, required);
        }
    }
    Ok(())
}

pub fn print_registrations(json: bool, response: &RegistrationListResponse) -> Result<()> {
    if json {
        return print_json(response);
    }
    for registration in &response.registrations {
        println!(
            "{:<38} {:<width$} {:<32} {}",
            registration.id,
            truncate_string(&registration.applicant_name(), NAME_WIDTH),
            truncate_string(&registration.applicant_email(), 32),
            registration.status,
            width = NAME_WIDTH
        );
    }
    let page = &response.pagination;
    println!(
        "Page {} of {} ({} total)",
        page.page,
        page.total_pages.max(1),
        page.total
    );
    let mut other_pages = Vec::new();
    if page.has_prev() {
        other_pages.push(format!("--page {}", page.page - 1));
    }
    if page.has_next() {
        other_pages.push(format!("--page {}", page.page + 1));
    }
    if !other_pages.is_empty() {
        println!("More: {}", other_pages.join(" or "));
    }
    Ok(())
}

pub fn print_counts(json: bool, counts: &StatusCounts) -> Result<()> {
    if json {
        return print_json(counts);
    }
    for status in RegistrationStatus::ALL {
        println!("{:<10} {}", status.to_string(), counts.get(status));
    }
    println!("{:<10} {}", "Total", counts.total());
    Ok(())
}

pub fn print_registration(
    json: bool,
    registration: &RegistrationWithFiles,
    schema: Option<&RegistrationFormSchema>,
) -> Result<()> {
    if json {
        return print_json(registration);
    }
    let reg = &registration.registration;
    println!("{} <{}>  [{}]", reg.applicant_name(), reg.applicant_email(), reg.status);
    println!(
        "  Submitted: {}",
        timezone::format_in_toronto(&reg.submitted_at, timezone::DEFAULT_DISPLAY_FORMAT)
            .unwrap_or_else(|| reg.submitted_at.clone())
    );
    if reg.is_reviewable() {
        println!("  Awaiting review (registrations accept|reject {})", reg.id);
    }
    if reg.checked_in {
        println!("  Checked in");
    }

    let mut keys: Vec<&String> = reg.form_data.keys().collect();
    keys.sort();
    for key in keys {
        println!(
            "  {}: {}",
            field_label(schema, key),
            format_field_value(&reg.form_data[key])
        );
    }

    if !registration.files.is_empty() {
        println!("\nFiles:");
        for file in registration.files.iter().filter(|f| !f.deleted) {
            println!("  {} ({}) {}", file.file_name, file.size_display(), file.file_url);
        }
    }
    Ok(())
}

pub fn print_users(json: bool, response: &UserListResponse) -> Result<()> {
    if json {
        return print_json(response);
    }
    for user in &response.users {
        println!(
            "{:<38} {:<width$} {:<32} {}",
            user.id,
            truncate_string(&user.display_name(), NAME_WIDTH),
            truncate_string(&user.email, 32),
            user.display_role,
            width = NAME_WIDTH
        );
    }
    println!("{} members", response.total);
    Ok(())
}

pub fn print_departments(json: bool, response: &DepartmentListResponse) -> Result<()> {
    if json {
        return print_json(response);
    }
    if let Some(year) = response.year {
        println!("Departments for {}:", year);
    }
    for department in &response.departments {
        println!("  {:<38} {} ({})", department.id, department.name, department.year);
    }
    Ok(())
}

pub fn print_years(json: bool, years: &YearsResponse) -> Result<()> {
    if json {
        return print_json(years);
    }
    for year in &years.years {
        let marker = if *year == years.current_year { " (current)" } else { "" };
        println!("{}{}", year, marker);
    }
    Ok(())
}
