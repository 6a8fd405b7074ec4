use anyhow::{anyhow, Context as _, Result};
use tracing::warn;

use portal_core::auth::{CredentialStore, SessionProvider};
use portal_core::models::{
    CreateEventRequest, GetDepartmentsParams, GetEventsParams, GetRegistrationsParams,
    GetUsersParams, InviteUserRequest, RegistrationFormSchema, ReviewDecision, UpdateEventRequest,
    UpdateUserRequest,
};
use portal_core::utils::timezone;

use crate::output;
use crate::{
    Command, Context, DepartmentsCommand, EventFields, EventsCommand, MembersCommand,
    RegistrationsCommand,
};

pub async fn run(ctx: &mut Context, command: Command) -> Result<()> {
    match command {
        Command::SignIn { email, remember } => sign_in(ctx, email, remember).await,
        Command::SignOut { forget } => sign_out(ctx, forget).await,
        Command::Whoami => {
            let user = ctx.portal.current_user().await?;
            let session = ctx.store.session();
            output::print_user(ctx.json, &user, session.as_ref())
        }
        Command::ChangePassword => {
            let current = prompt_password("Current password: ")?;
            let new = prompt_password("New password: ")?;
            let confirm = prompt_password("Confirm new password: ")?;
            ctx.portal.change_password(&current, &new, &confirm).await?;
            println!("Password changed successfully!");
            Ok(())
        }
        Command::ForgotPassword { email } => {
            ctx.portal.api().forgot_password(&email).await?;
            println!("If an account exists for {}, a reset link is on its way.", email);
            Ok(())
        }
        Command::ResetPassword { token } => {
            let password = prompt_password("New password: ")?;
            let confirm = prompt_password("Confirm new password: ")?;
            ctx.portal
                .api()
                .reset_password(&token, &password, &confirm)
                .await?;
            println!("Password updated. You can now sign in.");
            Ok(())
        }
        Command::AcceptInvite { preferred_name } => {
            let password = prompt_password("Choose a password: ")?;
            let confirm = prompt_password("Confirm password: ")?;
            let user = ctx
                .portal
                .complete_onboarding(&password, &confirm, preferred_name.as_deref())
                .await?;
            println!("Welcome aboard, {}!", user.display_name());
            Ok(())
        }
        Command::Events(cmd) => events(ctx, cmd).await,
        Command::Registrations(cmd) => registrations(ctx, cmd).await,
        Command::Members(cmd) => members(ctx, cmd).await,
        Command::Departments(cmd) => departments(ctx, cmd).await,
    }
}

fn prompt_password(prompt: &str) -> Result<String> {
    rpassword::prompt_password(prompt).context("Failed to read password")
}

fn prompt_line(prompt: &str) -> Result<String> {
    use std::io::Write;

    print!("{}", prompt);
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin()
        .read_line(&mut line)
        .context("Failed to read input")?;
    Ok(line.trim().to_string())
}

async fn sign_in(ctx: &mut Context, email: Option<String>, remember: bool) -> Result<()> {
    let email = match email.or_else(|| ctx.config.last_email.clone()) {
        Some(email) => email,
        None => prompt_line("Email: ")?,
    };
    if email.is_empty() {
        return Err(anyhow!("Email is required"));
    }

    let stored = if remember {
        None
    } else {
        CredentialStore::get_password(&email).unwrap_or_else(|e| {
            warn!(error = %e, "Keychain unavailable");
            None
        })
    };
    let password = match stored {
        Some(password) => password,
        None => prompt_password("Password: ")?,
    };

    let user = ctx.portal.sign_in(&email, &password).await?;

    if remember {
        if let Err(e) = CredentialStore::store(&email, &password) {
            warn!(error = %e, "Could not remember password");
        }
    }
    ctx.config.last_email = Some(email);
    if let Err(e) = ctx.config.save() {
        warn!(error = %e, "Failed to save config");
    }

    println!("Signed in as {} ({})", user.display_name(), user.display_role);
    Ok(())
}

async fn sign_out(ctx: &mut Context, forget: bool) -> Result<()> {
    if ctx.store.session().is_none() {
        println!("Not signed in.");
        return Ok(());
    }
    ctx.portal.sign_out().await?;
    if forget {
        if let Some(email) = ctx.config.last_email.take() {
            CredentialStore::delete(&email)?;
            ctx.config.save()?;
        }
    }
    println!("Signed out.");
    Ok(())
}

fn utc_from_local(label: &str, local: Option<String>) -> Result<Option<String>> {
    local
        .map(|value| {
            timezone::toronto_local_to_utc(&value).ok_or_else(|| {
                anyhow!(
                    "Invalid {} '{}': expected YYYY-MM-DDTHH:MM in Toronto time",
                    label,
                    value
                )
            })
        })
        .transpose()
}

fn create_request(fields: EventFields) -> Result<CreateEventRequest> {
    let title = fields.title.ok_or_else(|| anyhow!("--title is required"))?;
    let date_time = utc_from_local("date", fields.date)?.ok_or_else(|| anyhow!("--date is required"))?;
    Ok(CreateEventRequest {
        title,
        date_time,
        description: fields.description,
        location: fields.location,
        registration_deadline: utc_from_local("deadline", fields.deadline)?,
        status: fields.status,
        max_capacity: fields.capacity,
        category: fields.category,
        ..Default::default()
    })
}

fn update_request(fields: EventFields) -> Result<UpdateEventRequest> {
    Ok(UpdateEventRequest {
        title: fields.title,
        date_time: utc_from_local("date", fields.date)?,
        description: fields.description,
        location: fields.location,
        registration_deadline: utc_from_local("deadline", fields.deadline)?,
        status: fields.status,
        max_capacity: fields.capacity,
        category: fields.category,
        ..Default::default()
    })
}

async fn events(ctx: &mut Context, cmd: EventsCommand) -> Result<()> {
    match cmd {
        EventsCommand::List { status } => {
            let events = ctx.portal.events(&GetEventsParams { status }).await?;
            output::print_events(ctx.json, &events)
        }
        EventsCommand::Show { id } => {
            let event = ctx.portal.event(&id).await?;
            output::print_event(ctx.json, &event)
        }
        EventsCommand::Create(fields) => {
            let event = ctx.portal.create_event(&create_request(fields)?).await?;
            println!("Created event {} ({})", event.title, event.id);
            Ok(())
        }
        EventsCommand::Update { id, fields } => {
            let event = ctx.portal.update_event(&id, &update_request(fields)?).await?;
            println!("Updated {} [{}]", event.title, event.status);
            Ok(())
        }
        EventsCommand::Delete { id } => {
            ctx.portal.delete_event(&id).await?;
            println!("Deleted event {}", id);
            Ok(())
        }
    }
}

async fn registrations(ctx: &mut Context, cmd: RegistrationsCommand) -> Result<()> {
    match cmd {
        RegistrationsCommand::List {
            event_id,
            status,
            page,
            limit,
            search,
        } => {
            let params = GetRegistrationsParams {
                event_id,
                status,
                page,
                limit,
                search,
            };
            let response = ctx.portal.registrations(&params).await?;
            output::print_registrations(ctx.json, &response)
        }
        RegistrationsCommand::Counts { event_id } => {
            let counts = ctx.portal.registration_counts(&event_id).await?;
            output::print_counts(ctx.json, &counts)
        }
        RegistrationsCommand::Show { id } => {
            let detail = ctx.portal.registration(&id).await?;
            let event_id = detail.registration.registration.event_id.clone();
            // Field labels come from the event's form; fall back to raw keys
            let schema = match ctx.portal.event(&event_id).await {
                Ok(event) => event
                    .registration_form_schema
                    .as_ref()
                    .and_then(RegistrationFormSchema::from_value),
                Err(e) => {
                    warn!(error = %e, "Could not load form schema");
                    None
                }
            };
            output::print_registration(ctx.json, &detail.registration, schema.as_ref())
        }
        RegistrationsCommand::Accept { id } => review(ctx, &id, ReviewDecision::Accepted).await,
        RegistrationsCommand::Reject { id } => review(ctx, &id, ReviewDecision::Rejected).await,
        RegistrationsCommand::Export {
            event_id,
            status,
            dir,
        } => {
            let path = ctx
                .portal
                .export_registrations(&event_id, status, &dir)
                .await?;
            println!("Saved {}", path.display());
            Ok(())
        }
    }
}

async fn review(ctx: &mut Context, id: &str, decision: ReviewDecision) -> Result<()> {
    let response = ctx.portal.review_registration(id, decision).await?;
    let registration = &response.registration;
    println!(
        "{} is now {}",
        registration.applicant_name(),
        registration.status
    );
    if let Some(link) = response.rsvp_link {
        println!("RSVP link: {}", link);
    }
    Ok(())
}

async fn members(ctx: &mut Context, cmd: MembersCommand) -> Result<()> {
    match cmd {
        MembersCommand::List {
            department,
            role,
            year,
            search,
            page,
            page_size,
        } => {
            let params = GetUsersParams {
                department_id: department,
                role,
                year,
                search,
                page,
                page_size,
            };
            let response = ctx.portal.users(&params).await?;
            output::print_users(ctx.json, &response)
        }
        MembersCommand::Show { id } => {
            let user = ctx.portal.user(&id).await?;
            output::print_user(ctx.json, &user, None)
        }
        MembersCommand::Invite {
            email,
            first_name,
            last_name,
            role,
            display_role,
            department,
        } => {
            let invite = InviteUserRequest {
                email,
                first_name,
                last_name,
                role,
                display_role,
                department_id: department,
            };
            let response = ctx.portal.invite_user(&invite).await?;
            println!("{}", response.message);
            Ok(())
        }
        MembersCommand::Update {
            id,
            first_name,
            last_name,
            display_role,
            role,
            department,
        } => {
            let update = UpdateUserRequest {
                first_name,
                last_name,
                display_role,
                role,
                department_id: department,
            };
            let user = ctx.portal.update_user(&id, &update).await?;
            println!("Updated {}", user.display_name());
            Ok(())
        }
        MembersCommand::Delete { id } => {
            ctx.portal.delete_user(&id).await?;
            println!("Removed member {}", id);
            Ok(())
        }
    }
}

async fn departments(ctx: &mut Context, cmd: DepartmentsCommand) -> Result<()> {
    match cmd {
        DepartmentsCommand::List { year, all } => {
            let params = GetDepartmentsParams {
                year,
                all: all.then_some(true),
            };
            let response = ctx.portal.departments(&params).await?;
            output::print_departments(ctx.json, &response)
        }
        DepartmentsCommand::Years => {
            let years = ctx.portal.department_years().await?;
            output::print_years(ctx.json, &years)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_request_converts_toronto_time() {
        let fields = EventFields {
            title: Some("Case Night".to_string()),
            date: Some("2025-01-15T14:00".to_string()),
            capacity: Some(60),
            ..Default::default()
        };
        let request = create_request(fields).unwrap();
        assert_eq!(request.date_time, "2025-01-15T19:00:00.000Z");
        assert_eq!(request.max_capacity, Some(60));
        assert!(request.registration_deadline.is_none());
    }

    #[test]
    fn test_create_request_requires_title_and_date() {
        assert!(create_request(EventFields::default()).is_err());

        let fields = EventFields {
            title: Some("Case Night".to_string()),
            date: Some("tomorrow".to_string()),
            ..Default::default()
        };
        let err = create_request(fields).unwrap_err();
        assert!(err.to_string().contains("Invalid date 'tomorrow'"));
    }

    #[test]
    fn test_update_request_only_sets_given_fields() {
        let fields = EventFields {
            location: Some("Bahen 1180".to_string()),
            ..Default::default()
        };
        let request = update_request(fields).unwrap();
        assert_eq!(request.location.as_deref(), Some("Bahen 1180"));
        assert!(request.title.is_none());
        assert!(!request.is_empty());
    }
}
