use sea_orm::{ActiveValue, TransactionTrait, prelude::*};

use crate::{EngineError, ResultEngine, users, util::normalize_required_text};

use super::{Engine, with_tx};

impl Engine {
    /// Registers a user. Ids come from the identity provider and are stored
    /// as given (trimmed).
    pub async fn create_user(&self, user_id: &str, display_name: &str) -> ResultEngine<()> {
        let user_id = normalize_required_text(user_id, "user id")?;
        let display_name = normalize_required_text(display_name, "display name")?;
        with_tx!(self, |db_tx| {
            let exists = users::Entity::find_by_id(user_id.clone())
                .one(&db_tx)
                .await?
                .is_some();
            if exists {
                return Err(EngineError::ExistingKey(format!(
                    "user {user_id} already exists"
                )));
            }
            users::ActiveModel {
                id: ActiveValue::Set(user_id.clone()),
                display_name: ActiveValue::Set(display_name),
            }
            .insert(&db_tx)
            .await?;
            Ok(())
        })
    }
}
