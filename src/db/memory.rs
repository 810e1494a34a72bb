//! Process-local storage backend, used when no database is configured.

use std::{
    collections::BTreeMap,
    sync::{Mutex, MutexGuard, PoisonError},
};

use time::OffsetDateTime;

use super::{
    reply::Reply,
    ticket::{self, Filter, Ticket},
    user::{self, Role, User},
};

#[derive(Default)]
pub struct Store(Mutex<Tables>);

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    tickets: BTreeMap<ticket::Id, Ticket>,
    replies: Vec<Reply>,
}

impl Tables {
    fn with_reply_count(&self, mut ticket: Ticket) -> Ticket {
        ticket.replies =
            self.replies.iter().filter(|r| r.ticket == ticket.id).count();
        ticket
    }
}

impl Store {
    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(super) fn user_by_login(&self, login: &str) -> Option<User> {
        self.tables().users.iter().find(|u| u.login == login).cloned()
    }

    pub(super) fn user_by_id(&self, id: user::Id) -> Option<User> {
        self.tables().users.iter().find(|u| u.id == id).cloned()
    }

    pub(super) fn users_by_role(&self, role: Role) -> Vec<User> {
        let mut users = self
            .tables()
            .users
            .iter()
            .filter(|u| u.role == role)
            .cloned()
            .collect::<Vec<_>>();
        users.sort_by(|a, b| a.name.cmp(&b.name));
        users
    }

    pub(super) fn users_count(&self) -> usize {
        self.tables().users.len()
    }

    pub(super) fn create_user(&self, user: User) -> bool {
        let mut tables = self.tables();
        if tables.users.iter().any(|u| u.login == user.login) {
            return false;
        }
        tables.users.push(user);
        true
    }

    pub(super) fn write_user(&self, user: User) {
        let mut tables = self.tables();
        match tables.users.iter_mut().find(|u| u.id == user.id) {
            Some(existing) => *existing = user,
            None => tables.users.push(user),
        }
    }

    pub(super) fn ticket(&self, id: ticket::Id) -> Option<Ticket> {
        let tables = self.tables();
        tables
            .tickets
            .get(&id)
            .cloned()
            .map(|t| tables.with_reply_count(t))
    }

    pub(super) fn create_ticket(&self, new: ticket::New) -> Ticket {
        let mut tables = self.tables();
        let id = tables
            .tickets
            .last_key_value()
            .map_or(ticket::Id::from(1), |(id, _)| id.next());
        let ticket = new.into_ticket(id);
        tables.tickets.insert(id, ticket.clone());
        ticket
    }

    pub(super) fn write_ticket(&self, ticket: Ticket) {
        self.tables().tickets.insert(ticket.id, ticket);
    }

    pub(super) fn update_ticket(
        &self,
        id: ticket::Id,
        at: OffsetDateTime,
        change: impl FnOnce(&mut Ticket),
    ) {
        if let Some(ticket) = self.tables().tickets.get_mut(&id) {
            change(ticket);
            ticket.last_updated = at;
        }
    }

    pub(super) fn tickets_page(
        &self,
        filter: &Filter,
        offset: usize,
        limit: usize,
    ) -> Vec<Ticket> {
        let tables = self.tables();
        let mut tickets = tables
            .tickets
            .values()
            .filter(|t| filter.matches(t))
            .collect::<Vec<_>>();
        tickets.sort_by(|a, b| {
            b.last_updated
                .cmp(&a.last_updated)
                .then_with(|| b.id.cmp(&a.id))
        });
        tickets
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|t| tables.with_reply_count(t.clone()))
            .collect()
    }

    pub(super) fn tickets_count(&self, filter: &Filter) -> usize {
        self.tables()
            .tickets
            .values()
            .filter(|t| filter.matches(t))
            .count()
    }

    pub(super) fn replies(&self, ticket: ticket::Id) -> Vec<Reply> {
        let mut replies = self
            .tables()
            .replies
            .iter()
            .filter(|r| r.ticket == ticket)
            .cloned()
            .collect::<Vec<_>>();
        replies.sort_by_key(|r| r.created_at);
        replies
    }

    pub(super) fn write_reply(&self, reply: Reply) {
        let mut tables = self.tables();
        match tables.replies.iter_mut().find(|r| r.id == reply.id) {
            Some(existing) => *existing = reply,
            None => tables.replies.push(reply),
        }
    }
}

#[cfg(test)]
mod tests {
    use time::{macros::datetime, Duration};

    use crate::db::{
        reply::{self, Reply},
        ticket::{self, Category, Filter, Priority, Status},
        user,
    };

    use super::Store;

    fn new_ticket(subject: &str, minutes: i64) -> ticket::New {
        ticket::New {
            subject: subject.to_owned(),
            description: "Something is not working as expected".to_owned(),
            category: Category::GeneralInquiry,
            priority: Priority::Low,
            author: user::Id::from(1),
            created_at: datetime!(2024-07-20 10:00 UTC)
                + Duration::minutes(minutes),
        }
    }

    #[test]
    fn allocates_sequential_ids() {
        let store = Store::default();
        let first = store.create_ticket(new_ticket("First", 0));
        let second = store.create_ticket(new_ticket("Second", 1));

        assert_eq!(first.id, ticket::Id::from(1));
        assert_eq!(second.id, ticket::Id::from(2));
        assert_eq!(second.status, Status::Open);
        assert_eq!(second.assignee, None);
    }

    #[test]
    fn continues_after_written_ids() {
        let store = Store::default();
        let mut seeded = store.create_ticket(new_ticket("Seeded", 0));
        seeded.id = ticket::Id::from(8786);
        store.write_ticket(seeded);

        let created = store.create_ticket(new_ticket("Created", 1));
        assert_eq!(created.id, ticket::Id::from(8787));
    }

    #[test]
    fn pages_newest_first() {
        let store = Store::default();
        for (i, subject) in ["One", "Two", "Three"].into_iter().enumerate() {
            store.create_ticket(new_ticket(subject, i as i64));
        }

        let page = store.tickets_page(&Filter::default(), 1, 5);
        let subjects =
            page.iter().map(|t| t.subject.as_str()).collect::<Vec<_>>();
        assert_eq!(subjects, ["Two", "One"]);
        assert_eq!(store.tickets_count(&Filter::default()), 3);
    }

    #[test]
    fn counts_replies() {
        let store = Store::default();
        let ticket = store.create_ticket(new_ticket("Question", 0));
        for minutes in [2, 1] {
            store.write_reply(Reply {
                id: reply::Id::new(),
                ticket: ticket.id,
                author: user::Id::from(1),
                message: format!("after {minutes} minutes"),
                created_at: datetime!(2024-07-20 11:00 UTC)
                    + Duration::minutes(minutes),
            });
        }

        assert_eq!(store.ticket(ticket.id).map(|t| t.replies), Some(2));
        let messages = store
            .replies(ticket.id)
            .into_iter()
            .map(|r| r.message)
            .collect::<Vec<_>>();
        assert_eq!(messages, ["after 1 minutes", "after 2 minutes"]);
    }
}
