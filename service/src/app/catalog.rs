//! User and category administration.

use super::AppContext;
use crate::aggregates::rules::{CATEGORY_NAME, EMAIL, USER_NAME};
use crate::dto::{CategoryView, NewCategory, NewUser, UserView};
use crate::error::EwmError;
use crate::types::{Category, CategoryId, Page, UserId};
use std::sync::Arc;

/// User administration
pub struct UserService {
    ctx: Arc<AppContext>,
}

impl UserService {
    /// Create the service
    #[must_use]
    pub const fn new(ctx: Arc<AppContext>) -> Self {
        Self { ctx }
    }

    /// Register a user
    ///
    /// # Errors
    ///
    /// Validation for a bad name or email, Conflict for a taken email.
    pub async fn create_user(&self, new_user: NewUser) -> Result<UserView, EwmError> {
        USER_NAME.check(&new_user.name)?;
        EMAIL.check(&new_user.email)?;
        if !is_email(&new_user.email) {
            return Err(EwmError::validation(format!(
                "Field: email. Error: must be a well-formed email address. Value: {}",
                new_user.email
            )));
        }

        let user = self.ctx.storage.insert_user(new_user.name, new_user.email).await?;
        tracing::info!(user_id = %user.id, "User created");
        Ok(UserView::from(&user))
    }

    /// Users by id, optionally restricted to `ids`
    ///
    /// # Errors
    ///
    /// Storage failures only.
    pub async fn users(&self, ids: Option<Vec<UserId>>, page: Page) -> Result<Vec<UserView>, EwmError> {
        let users = self.ctx.storage.users(ids.as_deref(), page).await?;
        Ok(users.iter().map(UserView::from).collect())
    }

    /// Remove a user that nothing references
    ///
    /// # Errors
    ///
    /// NotFound for an unknown user, Conflict when the user still owns
    /// events, requests or comments.
    pub async fn delete_user(&self, user_id: UserId) -> Result<(), EwmError> {
        self.ctx.resolver.user(user_id).await?;
        if !self.ctx.storage.delete_user(user_id).await? {
            return Err(EwmError::not_found("User", user_id.value()));
        }
        tracing::info!(%user_id, "User deleted");
        Ok(())
    }
}

/// Category administration
pub struct CategoryService {
    ctx: Arc<AppContext>,
}

impl CategoryService {
    /// Create the service
    #[must_use]
    pub const fn new(ctx: Arc<AppContext>) -> Self {
        Self { ctx }
    }

    /// Add a category
    ///
    /// # Errors
    ///
    /// Validation for a bad name, Conflict for a taken name.
    pub async fn create_category(&self, new_category: NewCategory) -> Result<CategoryView, EwmError> {
        CATEGORY_NAME.check(&new_category.name)?;
        let category = self.ctx.storage.insert_category(new_category.name).await?;
        tracing::info!(category_id = %category.id, "Category created");
        Ok(CategoryView::from(&category))
    }

    /// Rename a category
    ///
    /// # Errors
    ///
    /// NotFound for an unknown category, Validation for a bad name, Conflict
    /// for a name used by another category.
    pub async fn update_category(
        &self,
        category_id: CategoryId,
        update: NewCategory,
    ) -> Result<CategoryView, EwmError> {
        CATEGORY_NAME.check(&update.name)?;
        let mut category: Category = self.ctx.resolver.category(category_id).await?;
        if category.name != update.name {
            category.name = update.name;
            self.ctx.storage.update_category(category.clone()).await?;
            tracing::info!(%category_id, "Category renamed");
        }
        Ok(CategoryView::from(&category))
    }

    /// Remove a category no event uses
    ///
    /// # Errors
    ///
    /// NotFound for an unknown category, Conflict while events reference it.
    pub async fn delete_category(&self, category_id: CategoryId) -> Result<(), EwmError> {
        self.ctx.resolver.category(category_id).await?;
        if !self.ctx.storage.delete_category(category_id).await? {
            return Err(EwmError::not_found("Category", category_id.value()));
        }
        tracing::info!(%category_id, "Category deleted");
        Ok(())
    }

    /// All categories by id
    ///
    /// # Errors
    ///
    /// Storage failures only.
    pub async fn categories(&self, page: Page) -> Result<Vec<CategoryView>, EwmError> {
        let categories = self.ctx.storage.categories(page).await?;
        Ok(categories.iter().map(CategoryView::from).collect())
    }

    /// One category
    ///
    /// # Errors
    ///
    /// NotFound for an unknown category.
    pub async fn category(&self, category_id: CategoryId) -> Result<CategoryView, EwmError> {
        let category = self.ctx.resolver.category(category_id).await?;
        Ok(CategoryView::from(&category))
    }
}

/// `local@domain.tld`, with no whitespace and exactly one `@`
fn is_email(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.split('.').count() >= 2
        && domain.split('.').all(|part| !part.is_empty())
        && !value.chars().any(char::is_whitespace)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_shape() {
        assert!(is_email("ann@example.com"));
        assert!(is_email("a.b@mail.co.uk"));
        assert!(!is_email("ann.example.com"));
        assert!(!is_email("ann@@example.com"));
        assert!(!is_email("ann@example"));
        assert!(!is_email("a nn@example.com"));
        assert!(!is_email("@example.com"));
    }
}
