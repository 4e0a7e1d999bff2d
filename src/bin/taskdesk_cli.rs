//!
//! taskdesk CLI binary
//! -------------------
//! Thin host for the auth core: sign in, inspect and revoke sessions, and
//! check permissions from a terminal. Configuration comes from `TASKDESK_*`
//! environment variables; set `TASKDESK_TOKEN_FILE` to keep the access token
//! and the refresh cookie between invocations.

use std::env;

use anyhow::{bail, Context, Result};

use taskdesk::identity::{can_manage_roles, can_manage_users, has_permission, perms};
use taskdesk::{ApiClient, ClientConfig, SessionManager};

fn print_usage(program: &str) {
    eprintln!(
        "Usage:\n  {program} login --email <e> --password <p> [--remember]\n  {program} logout\n  {program} whoami\n  {program} sessions\n  {program} revoke <session-id>\n  {program} revoke-others\n  {program} can <permission>\n\nEnvironment:\n  TASKDESK_API_URL             API base URL (required), e.g. http://localhost:4000/api\n  TASKDESK_TOKEN_FILE          file that persists the access token between runs;\n                               the refresh cookie goes to <name>.cookies.json beside it\n  TASKDESK_HTTP_TIMEOUT_SECS   request timeout in seconds (default 30)\n  RUST_LOG                     tracing filter, e.g. taskdesk=debug"
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();

    let mut args: Vec<String> = env::args().collect();
    let program = args.remove(0);
    if args.is_empty() || args.iter().any(|a| a == "-h" || a == "--help") {
        print_usage(&program);
        return Ok(());
    }

    let config = ClientConfig::from_env()
        .context("loading configuration")?
        .with_user_agent(format!("taskdesk_cli/{}", env!("CARGO_PKG_VERSION")));
    let api = ApiClient::new(config).context("building API client")?;
    let sessions = SessionManager::new(api);

    let command = args.remove(0);
    match command.as_str() {
        "login" => {
            let mut email: Option<String> = None;
            let mut password: Option<String> = None;
            let mut remember = false;
            let mut i = 0;
            while i < args.len() {
                match args[i].as_str() {
                    "--email" => {
                        if i + 1 >= args.len() { bail!("--email requires a value"); }
                        email = Some(args[i + 1].clone());
                        i += 2;
                    }
                    "--password" => {
                        if i + 1 >= args.len() { bail!("--password requires a value"); }
                        password = Some(args[i + 1].clone());
                        i += 2;
                    }
                    "--remember" => { remember = true; i += 1; }
                    unk => bail!("unrecognized argument: {}", unk),
                }
            }
            let email = email.context("--email is required")?;
            let password = password.context("--password is required")?;
            let user = sessions.login(&email, &password, remember).await.context("login failed")?;
            println!("Welcome back, {}!", user.name);
        }
        "logout" => {
            sessions.logout().await;
            println!("Logged out");
        }
        "whoami" => {
            let Some(user) = sessions.restore().await.context("fetching current user")? else {
                bail!("not signed in (run `{} login ...`)", program);
            };
            println!("user: {} <{}>", user.name, user.email);
            println!("role: {}", user.role.name);
            for p in &user.role.permissions {
                println!("  {}", p);
            }
            let yes_no = |b: bool| if b { "yes" } else { "no" };
            println!(
                "tasks: create={} update={} delete={}",
                yes_no(has_permission(&user, perms::TASK_CREATE)),
                yes_no(has_permission(&user, perms::TASK_UPDATE)),
                yes_no(has_permission(&user, perms::TASK_DELETE))
            );
            println!("admin: users={} roles={}", yes_no(can_manage_users(&user)), yes_no(can_manage_roles(&user)));
        }
        "sessions" => {
            let list = sessions.list_sessions().await.context("listing sessions")?;
            for s in &list.sessions {
                let marker = if list.is_current(s) { "*" } else { " " };
                let device = s
                    .device_info
                    .as_ref()
                    .map(|d| format!("{} / {}", d.browser.as_deref().unwrap_or("?"), d.os.as_deref().unwrap_or("?")))
                    .unwrap_or_else(|| "unknown device".to_string());
                println!(
                    "{} {} {} ip={} last_activity={}",
                    marker,
                    s.id,
                    device,
                    s.ip_address.as_deref().unwrap_or("-"),
                    s.last_activity.to_rfc3339()
                );
            }
        }
        "revoke" => {
            let id = args.first().context("revoke requires a session id")?;
            sessions.revoke_session(id).await.with_context(|| format!("revoking session {}", id))?;
            println!("Revoked {}", id);
        }
        "revoke-others" => {
            let n = sessions.revoke_all_others().await.context("revoking other sessions")?;
            println!("Revoked {} session(s)", n);
        }
        "can" => {
            let perm = args.first().context("can requires a permission string")?;
            let Some(user) = sessions.restore().await.context("fetching current user")? else {
                bail!("not signed in");
            };
            let allowed = has_permission(&user, perm);
            println!("{}: {}", perm, if allowed { "allowed" } else { "denied" });
        }
        other => {
            eprintln!("Unrecognized command: {}", other);
            print_usage(&program);
            std::process::exit(2);
        }
    }
    Ok(())
}
