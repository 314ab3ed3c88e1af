use exn::ResultExt;
use serde_json::Value;
use tankobon_config::Entity;
use tankobon_schema::models::User;
use tankobon_schema::validate_users;
use tracing::instrument;

use super::{NaturalKey, Seeder};
use crate::error::{ErrorKind, Result};
use crate::stats::{Action, EntityStats, Upserted};

impl NaturalKey for User {
    fn natural_key(&self) -> String {
        self.email.clone()
    }
}

impl Seeder {
    pub(super) async fn seed_users(&self, records: &[Value]) -> EntityStats {
        let validated = validate_users(records);
        self.run_step(Entity::Users, &validated, |user| self.upsert_user(user)).await
    }

    /// Users are keyed by (lowercased) email.
    #[instrument(level = "debug", skip_all, fields(email = %user.email))]
    async fn upsert_user(&self, user: &User) -> Result<Upserted> {
        let existing = self.repo.get_user_by_email(&user.email).await.or_raise(|| ErrorKind::Database)?;
        let action = match existing {
            None => {
                self.repo.insert_user(user).await.or_raise(|| ErrorKind::Database)?;
                Action::Created
            },
            Some(_) if !self.config.force => Action::Skipped,
            Some(row) => {
                self.repo.update_user(row.id, user).await.or_raise(|| ErrorKind::Database)?;
                Action::Updated
            },
        };
        Ok(Upserted::new(action))
    }
}
