use anyhow::{Context, Result};
use sea_orm::sea_query::Expr;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};

use crate::entities::users;
use crate::models::User;

impl From<users::Model> for User {
    fn from(model: users::Model) -> Self {
        Self {
            id: model.id,
            username: model.username,
            email: model.email,
            credential: model.passhash,
        }
    }
}

pub struct UserRepository {
    conn: DatabaseConnection,
}

impl UserRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Insert a user. `passhash` must already be an encoded credential.
    pub async fn create(&self, username: &str, email: &str, passhash: &str) -> Result<User> {
        let active = users::ActiveModel {
            username: Set(username.to_string()),
            email: Set(email.to_string()),
            passhash: Set(passhash.to_string()),
            ..Default::default()
        };

        let model = active
            .insert(&self.conn)
            .await
            .context("Failed to insert user")?;

        Ok(User::from(model))
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        let user = users::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query user by ID")?;

        Ok(user.map(User::from))
    }

    pub async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        let user = users::Entity::find()
            .filter(users::Column::Username.eq(username))
            .one(&self.conn)
            .await
            .context("Failed to query user by username")?;

        Ok(user.map(User::from))
    }

    pub async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        let user = users::Entity::find()
            .filter(users::Column::Email.eq(email))
            .one(&self.conn)
            .await
            .context("Failed to query user by email")?;

        Ok(user.map(User::from))
    }

    /// Returns `false` when no user has this ID.
    pub async fn update_username(&self, id: i64, username: &str) -> Result<bool> {
        self.update_column(id, users::Column::Username, username)
            .await
            .context("Failed to update username")
    }

    pub async fn update_email(&self, id: i64, email: &str) -> Result<bool> {
        self.update_column(id, users::Column::Email, email)
            .await
            .context("Failed to update email")
    }

    pub async fn update_passhash(&self, id: i64, passhash: &str) -> Result<bool> {
        self.update_column(id, users::Column::Passhash, passhash)
            .await
            .context("Failed to update password hash")
    }

    async fn update_column(
        &self,
        id: i64,
        column: users::Column,
        value: &str,
    ) -> Result<bool, sea_orm::DbErr> {
        let result = users::Entity::update_many()
            .col_expr(column, Expr::value(value))
            .filter(users::Column::Id.eq(id))
            .exec(&self.conn)
            .await?;

        Ok(result.rows_affected > 0)
    }

    /// Sessions and file rows go with the user (ON DELETE CASCADE).
    pub async fn delete(&self, id: i64) -> Result<bool> {
        let result = users::Entity::delete_by_id(id)
            .exec(&self.conn)
            .await
            .context("Failed to delete user")?;

        Ok(result.rows_affected > 0)
    }
}
