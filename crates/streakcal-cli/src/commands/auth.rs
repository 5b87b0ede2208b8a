use clap::Subcommand;
use streakcal_core::integrations::GoogleAuth;

use super::CmdResult;

#[derive(Subcommand)]
pub enum AuthAction {
    /// Google (Calendar and Gmail): login / logout / status
    Google {
        #[command(subcommand)]
        action: AuthOp,
    },
}

#[derive(Subcommand)]
pub enum AuthOp {
    /// Authorize in the browser
    Login {
        /// OAuth client ID (stored in the keyring)
        #[arg(long)]
        client_id: Option<String>,
        /// OAuth client secret (stored in the keyring)
        #[arg(long)]
        client_secret: Option<String>,
    },
    /// Remove stored tokens
    Logout,
    /// Check authentication status
    Status,
}

pub fn run(action: AuthAction) -> CmdResult {
    match action {
        AuthAction::Google { action: op } => handle_google(op),
    }
}

fn handle_google(op: AuthOp) -> CmdResult {
    match op {
        AuthOp::Login {
            client_id,
            client_secret,
        } => {
            match (client_id, client_secret) {
                (Some(cid), Some(csec)) => GoogleAuth::set_credentials(&cid, &csec)?,
                (None, None) => {}
                _ => return Err("--client-id and --client-secret go together".into()),
            }
            let g = GoogleAuth::new();
            if !g.has_credentials() {
                return Err("--client-id and --client-secret required for Google".into());
            }
            g.authenticate()?;
            println!("Google authenticated");
        }
        AuthOp::Logout => {
            GoogleAuth::new().disconnect()?;
            println!("Google disconnected");
        }
        AuthOp::Status => {
            let g = GoogleAuth::new();
            println!(
                "{}",
                if g.is_authenticated() {
                    "authenticated"
                } else if g.has_credentials() {
                    "not authenticated (credentials stored)"
                } else {
                    "not authenticated"
                }
            );
        }
    }
    Ok(())
}
