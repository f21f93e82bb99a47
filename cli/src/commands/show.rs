//! Show a single user command.

use anyhow::{Context as _, Result};
use roster_business::{DirectoryStore, User, UserId};
use tracing::instrument;

use crate::context::settle;
use crate::output::Output;

#[instrument(skip_all, name = "show", fields(user_id = id))]
pub async fn run_show(mut store: DirectoryStore, id: u64) -> Result<()> {
    let out = Output::new();

    store
        .load_by_id(Some(UserId(id)))
        .context("Failed to start loading the user")?;
    settle(&mut store).await?;
    let state = store.snapshot();
    store.shutdown().await;

    if let Some(message) = state.error() {
        out.error(message);
        std::process::exit(1);
    }

    let Some(user) = state.selected_user() else {
        out.error("User not found");
        std::process::exit(1);
    };

    print_user(&out, user);
    Ok(())
}

fn print_user(out: &Output, user: &User) {
    out.header(&user.name);
    out.labeled_indent("ID", user.id, 2);
    out.labeled_indent("Email", &user.email, 2);
    out.labeled_indent("Phone", &user.phone, 2);

    out.newline();
    out.subheader("Address");
    let address = &user.address;
    let street = format!("{}, {}", address.street, address.suite);
    out.labeled_indent("Street", street, 2);
    out.labeled_indent("City", format!("{} {}", address.city, address.zipcode), 2);

    out.newline();
    out.subheader("Company");
    out.labeled_indent("Name", &user.company.name, 2);
    out.labeled_indent("Catch phrase", &user.company.catch_phrase, 2);
}
