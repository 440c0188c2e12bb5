use crate::cli::{
    actions::{login, Action},
    commands::{
        ARG_ANON_KEY, ARG_BACKEND_URL, ARG_EMAIL, ARG_PASSWORD, ARG_WATCH, CMD_LOGIN,
    },
    globals::GlobalArgs,
};
use anyhow::{anyhow, Context, Result};
use secrecy::SecretString;

fn backend_args(matches: &clap::ArgMatches) -> Result<GlobalArgs> {
    let backend_url = matches
        .get_one::<String>(ARG_BACKEND_URL)
        .cloned()
        .context("missing required argument: --backend-url")?;
    let anon_key = matches
        .get_one::<String>(ARG_ANON_KEY)
        .cloned()
        .context("missing required argument: --anon-key")?;

    let mut globals = GlobalArgs::new(backend_url);
    globals.set_anon_key(SecretString::from(anon_key));
    Ok(globals)
}

/// # Errors
/// Returns an error if required arguments are missing or the subcommand is unknown.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    match matches.subcommand() {
        Some((CMD_LOGIN, sub_m)) => {
            let email = sub_m
                .get_one::<String>(ARG_EMAIL)
                .cloned()
                .context("missing required argument: --email")?;
            let password = sub_m
                .get_one::<String>(ARG_PASSWORD)
                .cloned()
                .context("missing required argument: --password")?;

            Ok(Action::Login(login::Args {
                globals: backend_args(sub_m)?,
                email,
                password: SecretString::from(password),
                watch: sub_m.get_flag(ARG_WATCH),
            }))
        }
        Some((name, _)) => Err(anyhow!("unknown subcommand: {name}")),
        None => Err(anyhow!("missing subcommand")),
    }
}
