//! User account command handlers.

use dialoguer::{Confirm, Password};
use secrecy::SecretString;
use serde::Serialize;
use tabled::Tabled;

use iotdata_core::{Engine, Role, UserDraft};

use crate::cli::{GlobalOpts, RoleArg, UsersArgs, UsersCommand};
use crate::error::CliError;
use crate::output;

#[derive(Tabled, Serialize)]
struct UserRow {
    #[tabled(rename = "Username")]
    username: String,
    #[tabled(rename = "Full Name")]
    full_name: String,
    #[tabled(rename = "Role")]
    role: String,
    #[tabled(rename = "Email")]
    email: String,
    #[tabled(rename = "Location")]
    location: String,
}

impl From<RoleArg> for Role {
    fn from(arg: RoleArg) -> Self {
        match arg {
            RoleArg::User => Role::User,
            RoleArg::Support => Role::Support,
            RoleArg::Admin => Role::Admin,
            RoleArg::Master => Role::Master,
        }
    }
}

pub async fn handle(engine: &Engine, args: UsersArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        UsersCommand::List => {
            let rows: Vec<UserRow> = engine
                .store()
                .users_snapshot()
                .iter()
                .map(|u| UserRow {
                    username: u.username.clone(),
                    full_name: u.full_name.clone().unwrap_or_default(),
                    role: u.role.to_string(),
                    email: u.email.clone().unwrap_or_default(),
                    location: match (&u.city, &u.state) {
                        (Some(city), Some(state)) => format!("{city}-{state}"),
                        (Some(city), None) => city.clone(),
                        _ => String::new(),
                    },
                })
                .collect();

            let rendered = output::render_list(&global.output, &rows, |r| r.username.clone());
            output::print_output(&rendered, global.quiet);
        }

        UsersCommand::Create {
            username,
            role,
            full_name,
            email,
            phone,
            city,
            state,
        } => {
            let password: SecretString = Password::new()
                .with_prompt(format!("Password for {username}"))
                .with_confirmation("Confirm password", "passwords do not match")
                .interact()?
                .into();

            engine
                .save_user(UserDraft {
                    id: None,
                    username: username.clone(),
                    password: Some(password),
                    role: role.into(),
                    full_name,
                    email,
                    phone,
                    address: None,
                    city,
                    state,
                })
                .await?;
            output::print_status(&format!("created user {username}"), global.quiet);
        }

        UsersCommand::Update {
            username,
            role,
            full_name,
            email,
            phone,
            city,
            state,
            password,
        } => {
            let existing = engine
                .store()
                .user_by_username(&username)
                .ok_or_else(|| CliError::message(format!("unknown user: {username}")))?;

            let new_password: Option<SecretString> = if password {
                Some(
                    Password::new()
                        .with_prompt(format!("New password for {username}"))
                        .with_confirmation("Confirm password", "passwords do not match")
                        .interact()?
                        .into(),
                )
            } else {
                None
            };

            engine
                .save_user(UserDraft {
                    id: Some(existing.id),
                    username: username.clone(),
                    password: new_password,
                    role: role.map_or(existing.role, Role::from),
                    full_name: full_name.or_else(|| existing.full_name.clone()),
                    email: email.or_else(|| existing.email.clone()),
                    phone: phone.or_else(|| existing.phone.clone()),
                    address: existing.address.clone(),
                    city: city.or_else(|| existing.city.clone()),
                    state: state.or_else(|| existing.state.clone()),
                })
                .await?;
            output::print_status(&format!("updated user {username}"), global.quiet);
        }

        UsersCommand::Delete { username } => {
            if username == engine.session().username() {
                return Err(CliError::message("refusing to delete the logged-in account"));
            }
            let user = engine
                .store()
                .user_by_username(&username)
                .ok_or_else(|| CliError::message(format!("unknown user: {username}")))?;

            if !global.yes {
                let confirmed = Confirm::new()
                    .with_prompt(format!("Delete user {username}?"))
                    .default(false)
                    .interact()?;
                if !confirmed {
                    return Ok(());
                }
            }

            engine.delete_user(user.id).await?;
            output::print_status(&format!("deleted user {username}"), global.quiet);
        }
    }
    Ok(())
}
