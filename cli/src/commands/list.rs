//! List users command.

use anyhow::{Context as _, Result};
use roster_business::{DirectoryStore, User, UserListView};
use tabled::settings::Style;
use tabled::{Table, Tabled};
use tracing::instrument;

use crate::context::settle;
use crate::output::Output;

#[derive(Debug, Tabled)]
pub struct UserRow {
    #[tabled(rename = "ID")]
    id: u64,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Email")]
    email: String,
    #[tabled(rename = "City")]
    city: String,
    #[tabled(rename = "Company")]
    company: String,
}

impl From<&User> for UserRow {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.0,
            name: user.name.clone(),
            email: user.email.clone(),
            city: user.address.city.clone(),
            company: user.company.name.clone(),
        }
    }
}

/// The list view after scrolling `pages` pages and then searching for `search`.
pub fn scrolled_view(
    mut view: UserListView,
    users: &[User],
    pages: usize,
    search: Option<&str>,
) -> UserListView {
    for _ in 1..pages {
        if !view.load_more(users) {
            break;
        }
    }
    if let Some(text) = search {
        view.set_search_query(text);
    }
    view
}

#[instrument(skip_all, name = "list", fields(search = search.as_deref().unwrap_or(""), pages))]
pub async fn run_list(
    mut store: DirectoryStore,
    search: Option<String>,
    pages: usize,
) -> Result<()> {
    let out = Output::new();

    store.load_all().context("Failed to start loading users")?;
    settle(&mut store).await?;
    let state = store.snapshot();
    store.shutdown().await;

    if let Some(message) = state.error() {
        out.error(message);
        std::process::exit(1);
    }

    let users = state.users();
    let view = scrolled_view(
        UserListView::from_config(store.config()),
        users,
        pages,
        search.as_deref(),
    );
    let visible = view.visible_users(users);

    if visible.is_empty() {
        out.dim("No users found.");
        return Ok(());
    }

    let rows: Vec<UserRow> = visible.iter().copied().map(UserRow::from).collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    out.print(table);
    out.showing(visible.len(), view.matching_count(users));
    if view.has_more(users) {
        out.dim("More users available, pass a larger --pages to see them.");
    }
    if let Some(at) = state.users_loaded_at() {
        let refreshed = at.format("%Y-%m-%d %H:%M:%S UTC");
        out.dim(format!("Last refreshed {refreshed}"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use roster_business::{Address, Company, SearchPagePolicy, UserId};

    use super::*;

    fn users(n: u64) -> Vec<User> {
        (1..=n)
            .map(|id| User {
                id: UserId(id),
                name: if id % 2 == 0 {
                    format!("Even {id}")
                } else {
                    format!("Odd {id}")
                },
                email: format!("user{id}@example.com"),
                phone: String::new(),
                address: Address::default(),
                company: Company::default(),
            })
            .collect()
    }

    #[test]
    fn pages_advance_the_view() {
        let users = users(25);
        let view = scrolled_view(UserListView::new(10), &users, 3, None);
        assert_eq!(view.page(), 3);
        assert_eq!(view.visible_users(&users).len(), 25);
    }

    #[test]
    fn pages_stop_once_everything_is_visible() {
        let users = users(5);
        let view = scrolled_view(UserListView::new(10), &users, 4, None);
        assert_eq!(view.page(), 1);
    }

    #[test]
    fn reset_policy_drops_pages_when_searching() {
        let users = users(30);
        let keep = scrolled_view(UserListView::new(10), &users, 2, Some("odd"));
        assert_eq!(keep.visible_users(&users).len(), 15);

        let reset = scrolled_view(
            UserListView::new(10).with_search_page_policy(SearchPagePolicy::ResetToFirstPage),
            &users,
            2,
            Some("odd"),
        );
        assert_eq!(reset.page(), 1);
        assert_eq!(reset.visible_users(&users).len(), 10);
    }

    #[test]
    fn row_takes_city_and_company_name() {
        let mut user = users(1).remove(0);
        user.address.city = "Gwenborough".to_owned();
        user.company.name = "Romaguera-Crona".to_owned();

        let row = UserRow::from(&user);
        assert_eq!(row.id, 1);
        assert_eq!(row.city, "Gwenborough");
        assert_eq!(row.company, "Romaguera-Crona");
    }
}
