use std::{
    io::{self, BufRead, Write},
    path::PathBuf,
};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use time::OffsetDateTime;
use tracing::info;
use url::Url;

use crate::{
    app::App,
    auth::{
        callback,
        dto::{LoginRequest, RegisterRequest, ResetPasswordRequest, VerifyEmailRequest},
        RedirectOutcome,
    },
    food::{
        display::{format_added, format_consumed, time_ago},
        dto::{FoodItem, FoodItemDraft},
        export::{export_csv, ExportRange},
        filter::{FilteredView, Tab},
        Confirm, FoodCollection,
    },
    routes::{guard::GuardState, Navigator, Route},
};

const EMPTY_LIST: &str = "No food items found. Add some food items to see them here!";

/// foodkeeper - track what you eat
#[derive(Parser)]
#[command(name = "foodkeeper")]
#[command(about = "Track daily food consumption and calorie intake", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create an account; a verification code is emailed
    Register {
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        #[arg(long)]
        email: String,
        #[arg(long, env = "FOODKEEPER_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Confirm an email address with the emailed code
    Verify {
        #[arg(long)]
        email: String,
        #[arg(long)]
        otp: String,
    },
    /// Send a new verification code
    Resend {
        #[arg(long)]
        email: String,
    },
    /// Request a password reset code
    Forgot {
        #[arg(long)]
        email: String,
    },
    /// Set a new password with a reset code
    Reset {
        #[arg(long)]
        email: String,
        #[arg(long)]
        otp: String,
        #[arg(long, env = "FOODKEEPER_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long)]
        confirm: String,
    },
    /// Sign in with email and password
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "FOODKEEPER_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Sign in through the OAuth2 provider
    Oauth {
        /// Redirect address copied from the browser, instead of listening for it
        #[arg(long)]
        redirect: Option<Url>,
    },
    /// Forget the stored session
    Logout,
    /// Show the signed-in user
    Whoami,
    /// List food items
    List {
        /// Case-insensitive match on name or description
        #[arg(long)]
        search: Option<String>,
        /// all, recent, consumed or with-calories
        #[arg(long, default_value_t = Tab::All)]
        tab: Tab,
    },
    /// Log a food item
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        calorie: Option<String>,
        #[arg(long)]
        quantity: Option<String>,
        /// When it was eaten, YYYY-MM-DDTHH:MM
        #[arg(long)]
        consumed: Option<String>,
    },
    /// Change a food item; omitted fields keep their value
    Edit {
        id: i64,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        calorie: Option<String>,
        #[arg(long)]
        quantity: Option<String>,
        #[arg(long)]
        consumed: Option<String>,
    },
    /// Delete a food item
    Delete {
        id: i64,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Download food history as CSV
    Export {
        /// Start date, YYYY-MM-DD
        #[arg(long)]
        from: Option<String>,
        /// End date, YYYY-MM-DD
        #[arg(long)]
        to: Option<String>,
        /// Directory to write into
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
}

impl Command {
    /// The view a command belongs to; only protected views pass the guard.
    pub fn route(&self) -> Route {
        match self {
            Command::Register { .. } => Route::Register,
            Command::Verify { email, .. } | Command::Resend { email } => Route::VerifyEmail {
                email: email.clone(),
            },
            Command::Forgot { .. } | Command::Reset { .. } => Route::ForgotPassword,
            Command::Login { .. } | Command::Logout => Route::login(),
            Command::Oauth { .. } => Route::OAuthRedirect,
            Command::Whoami
            | Command::List { .. }
            | Command::Add { .. }
            | Command::Edit { .. }
            | Command::Delete { .. }
            | Command::Export { .. } => Route::Dashboard,
        }
    }
}

/// Yes/no prompt on the terminal. Anything but `y`/`yes` declines.
pub struct StdinConfirm;

impl Confirm for StdinConfirm {
    fn confirm(&self, prompt: &str) -> bool {
        print!("{prompt} [y/N] ");
        if io::stdout().flush().is_err() {
            return false;
        }
        let mut answer = String::new();
        if io::stdin().lock().read_line(&mut answer).is_err() {
            return false;
        }
        matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
    }
}

/// Starts the session and passes the route guard; fails if not signed in.
async fn admit(app: &App) -> anyhow::Result<()> {
    app.session().initialize().await;
    match app.guard().admit().await {
        GuardState::Admitted => Ok(()),
        _ => bail!("sign-in required"),
    }
}

async fn loaded_collection(app: &App) -> anyhow::Result<FoodCollection> {
    let collection = app.collection();
    collection.load().await?;
    Ok(collection)
}

fn print_item(item: &FoodItem, now: OffsetDateTime) {
    let mut line = format!("#{:<5} {}", item.id, item.name);
    if let Some(calorie) = item.calorie.filter(|c| *c > 0) {
        line.push_str(&format!("  [{calorie} calories]"));
    }
    if let Some(quantity) = &item.quantity {
        line.push_str(&format!("  [{quantity}]"));
    }
    println!("{line}");
    if let Some(description) = &item.description {
        println!("       {description}");
    }
    let mut meta = format!("Added: {}", format_added(item.created_at));
    if item.consumed_date.is_some() {
        meta.push_str(&format!(
            " • Consumed: {}",
            format_consumed(item.consumed_date, now)
        ));
    }
    meta.push_str(&format!(" • {}", time_ago(item.created_at, now)));
    println!("       {meta}");
}

fn print_view(view: &FilteredView, now: OffsetDateTime) {
    let tabs: Vec<String> = Tab::ALL.iter().map(|t| t.label(&view.counts)).collect();
    println!("{}", tabs.join("  "));
    println!();
    println!("{}", view.heading());
    if view.items.is_empty() {
        println!("{EMPTY_LIST}");
        return;
    }
    println!("Total Calories: {}", view.total_calories);
    for item in &view.items {
        print_item(item, now);
    }
}

fn print_banner(collection: &FoodCollection) {
    if let Some(message) = collection.banners().success_message() {
        println!("{message}");
    }
}

fn print_ack(message: Option<String>, fallback: &str) {
    println!("{}", message.unwrap_or_else(|| fallback.to_string()));
}

pub async fn run(cli: Cli, app: &App) -> anyhow::Result<()> {
    let session = app.session();
    if cli.command.route().is_protected() {
        admit(app).await?;
    }
    match cli.command {
        Command::Register {
            first_name,
            last_name,
            email,
            password,
        } => {
            let ack = session
                .register(RegisterRequest {
                    first_name,
                    last_name,
                    email: email.clone(),
                    password,
                })
                .await?;
            print_ack(ack.message, "Registration successful.");
            app.navigator().navigate(Route::VerifyEmail {
                email: email.trim().to_string(),
            });
        }
        Command::Verify { email, otp } => {
            let ack = session
                .verify_email(VerifyEmailRequest::new(&email, &otp))
                .await?;
            print_ack(ack.message, "Email verified. You can now log in.");
        }
        Command::Resend { email } => {
            let ack = session.resend_verification(&email).await?;
            print_ack(ack.message, "A new verification code has been sent.");
        }
        Command::Forgot { email } => {
            let ack = session.forgot_password(&email).await?;
            print_ack(ack.message, "A password reset code has been sent.");
        }
        Command::Reset {
            email,
            otp,
            password,
            confirm,
        } => {
            let ack = session
                .reset_password(ResetPasswordRequest::new(&email, &otp, password), &confirm)
                .await?;
            print_ack(ack.message, "Password reset. You can now log in.");
        }
        Command::Login { email, password } => {
            let resp = session.login(LoginRequest::new(&email, password)).await?;
            println!("Welcome, {}!", resp.user.first_name);
        }
        Command::Oauth { redirect } => {
            let redirect = match redirect {
                Some(url) => {
                    if Route::resolve(url.path()) != Route::OAuthRedirect {
                        bail!("{url} is not an OAuth2 redirect address");
                    }
                    url
                }
                None => {
                    let oauth = &app.config().oauth;
                    println!("Open this address in your browser to sign in:");
                    println!("  {}", oauth.authorize_url);
                    callback::wait_for_redirect(oauth.callback_addr).await?
                }
            };
            match app.redirect_handler().complete(&redirect).await {
                RedirectOutcome::Authenticated(user) => {
                    println!("Welcome, {}!", user.first_name);
                }
                RedirectOutcome::Rejected(message) => bail!(message),
            }
        }
        Command::Logout => {
            session.logout().await;
            println!("Logged out.");
        }
        Command::Whoami => {
            let user = session
                .snapshot()
                .user
                .context("session has no user profile")?;
            let name = match &user.last_name {
                Some(last) => format!("{} {last}", user.first_name),
                None => user.first_name.clone(),
            };
            println!("{name} <{}>", user.email);
            if !user.email_verified {
                println!("Email not verified.");
            }
        }
        Command::List { search, tab } => {
            let collection = loaded_collection(app).await?;
            if let Some(term) = search {
                collection.set_search_term(term).await;
            }
            collection.set_tab(tab).await;
            let now = OffsetDateTime::now_utc();
            print_view(&collection.view_at(now).await, now);
        }
        Command::Add {
            name,
            description,
            calorie,
            quantity,
            consumed,
        } => {
            let collection = app.collection();
            let item = collection
                .add(FoodItemDraft {
                    name,
                    description: description.unwrap_or_default(),
                    calorie: calorie.unwrap_or_default(),
                    quantity: quantity.unwrap_or_default(),
                    consumed_date: consumed.unwrap_or_default(),
                })
                .await?;
            print_banner(&collection);
            print_item(&item, OffsetDateTime::now_utc());
        }
        Command::Edit {
            id,
            name,
            description,
            calorie,
            quantity,
            consumed,
        } => {
            let collection = loaded_collection(app).await?;
            let Some(mut form) = collection.begin_edit(id).await else {
                bail!("No food item with id {id}");
            };
            let draft = &mut form.draft;
            for (field, value) in [
                (&mut draft.name, name),
                (&mut draft.description, description),
                (&mut draft.calorie, calorie),
                (&mut draft.quantity, quantity),
                (&mut draft.consumed_date, consumed),
            ] {
                if let Some(value) = value {
                    *field = value;
                }
            }
            let result = collection.submit_edit(&mut form).await;
            if let Some(error) = &form.error {
                bail!("{error}");
            }
            let item = result?;
            print_banner(&collection);
            print_item(&item, OffsetDateTime::now_utc());
        }
        Command::Delete { id, yes } => {
            let collection = app.collection();
            let deleted = if yes {
                collection.delete(id, &|_: &str| true).await?
            } else {
                collection.delete(id, &StdinConfirm).await?
            };
            if deleted {
                print_banner(&collection);
            } else {
                info!(item_id = id, "delete cancelled");
                println!("Nothing deleted.");
            }
        }
        Command::Export { from, to, out } => {
            let range = ExportRange::parse(from.as_deref(), to.as_deref())?;
            println!("{}", range.describe());
            let path = export_csv(app.food_api(), &range, &out).await?;
            println!("Saved {}", path.display());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        storage::TokenStore,
        test_support::{harness, EMAIL, GOOD_TOKEN, PASSWORD},
    };
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("foodkeeper").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn list_parses_tab_names() {
        let cli = Cli::try_parse_from(["foodkeeper", "list", "--tab", "with-calories"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::List {
                tab: Tab::WithCalories,
                search: None
            }
        ));
        assert!(Cli::try_parse_from(["foodkeeper", "list", "--tab", "snacks"]).is_err());
    }

    #[test]
    fn delete_takes_id_and_flag() {
        let cli = Cli::try_parse_from(["foodkeeper", "delete", "12", "--yes"]).unwrap();
        assert!(matches!(cli.command, Command::Delete { id: 12, yes: true }));
    }

    #[test]
    fn only_dashboard_commands_are_guarded() {
        assert!(parse(&["list"]).command.route().is_protected());
        assert!(parse(&["delete", "3"]).command.route().is_protected());
        assert_eq!(parse(&["forgot", "--email", EMAIL]).command.route(), Route::ForgotPassword);
        assert_eq!(parse(&["oauth"]).command.route(), Route::OAuthRedirect);
        assert!(!parse(&["logout"]).command.route().is_protected());
    }

    #[tokio::test]
    async fn register_moves_on_to_verification() {
        let h = harness().await;
        let cli = parse(&[
            "register",
            "--first-name",
            "Ada",
            "--last-name",
            "Lovelace",
            "--email",
            EMAIL,
            "--password",
            PASSWORD,
        ]);

        run(cli, &h.app).await.unwrap();
        assert_eq!(h.backend.mock.hits("POST /auth/register"), 1);
        assert_eq!(
            h.navigator.routes(),
            vec![Route::VerifyEmail {
                email: EMAIL.to_string()
            }]
        );
    }

    #[tokio::test]
    async fn protected_command_without_session_is_refused() {
        let h = harness().await;

        let err = run(parse(&["list"]), &h.app).await.unwrap_err();
        assert_eq!(err.to_string(), "sign-in required");
        assert_eq!(h.navigator.routes(), vec![Route::login()]);
        assert_eq!(h.backend.mock.hits("GET /food-items"), 0);
    }

    #[tokio::test]
    async fn pasted_redirect_completes_sign_in() {
        let h = harness().await;
        let redirect = format!("http://localhost:3000/oauth2/redirect?token={GOOD_TOKEN}&error=false");

        run(parse(&["oauth", "--redirect", &redirect]), &h.app)
            .await
            .unwrap();
        assert_eq!(h.store.load().await.unwrap().as_deref(), Some(GOOD_TOKEN));
        assert!(h.app.session().snapshot().is_authenticated);
        assert_eq!(h.navigator.routes(), vec![Route::Dashboard]);
    }

    #[tokio::test]
    async fn pasted_address_must_be_the_redirect_path() {
        let h = harness().await;

        let err = run(
            parse(&["oauth", "--redirect", "http://localhost:3000/login?token=abc"]),
            &h.app,
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("not an OAuth2 redirect address"));
        assert_eq!(h.store.load().await.unwrap(), None);
        assert_eq!(h.backend.mock.total_hits(), 0);
    }
}
