use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_users_table::Migration),
            Box::new(m20240101_000002_create_taxonomy_tables::Migration),
            Box::new(m20240101_000003_create_products_table::Migration),
            Box::new(m20240101_000004_create_product_media_tables::Migration),
        ]
    }
}

// Migration implementations

mod m20240101_000001_create_users_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000001_create_users_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Users::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Users::Id).uuid().primary_key().not_null())
                        .col(
                            ColumnDef::new(Users::Email)
                                .string_len(254)
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(Users::Phone)
                                .string_len(20)
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(Users::FirstName)
                                .string_len(150)
                                .not_null()
                                .default(""),
                        )
                        .col(
                            ColumnDef::new(Users::LastName)
                                .string_len(150)
                                .not_null()
                                .default(""),
                        )
                        .col(
                            ColumnDef::new(Users::Role)
                                .string_len(15)
                                .not_null()
                                .default("customer"),
                        )
                        .col(ColumnDef::new(Users::Avatar).string().null())
                        .col(ColumnDef::new(Users::PasswordHash).string().not_null())
                        .col(
                            ColumnDef::new(Users::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Users::DateJoined)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(AuthTokens::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(AuthTokens::Key)
                                .string_len(40)
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(AuthTokens::UserId)
                                .uuid()
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(AuthTokens::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_auth_tokens_user_id")
                                .from(AuthTokens::Table, AuthTokens::UserId)
                                .to(Users::Table, Users::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(AuthTokens::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Users::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Users {
        Table,
        Id,
        Email,
        Phone,
        FirstName,
        LastName,
        Role,
        Avatar,
        PasswordHash,
        IsActive,
        DateJoined,
    }

    #[derive(DeriveIden)]
    enum AuthTokens {
        Table,
        Key,
        UserId,
        CreatedAt,
    }
}

mod m20240101_000002_create_taxonomy_tables {

    use super::m20240101_000001_create_users_table::Users;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000002_create_taxonomy_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Categories::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Categories::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Categories::Name)
                                .string_len(250)
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Categories::UserId).uuid().not_null())
                        .col(
                            ColumnDef::new(Categories::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Categories::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_categories_user_id")
                                .from(Categories::Table, Categories::UserId)
                                .to(Users::Table, Users::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Tags::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Tags::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Tags::Name).string_len(255).not_null())
                        .col(ColumnDef::new(Tags::UserId).uuid().not_null())
                        .col(
                            ColumnDef::new(Tags::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Tags::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_tags_user_id")
                                .from(Tags::Table, Tags::UserId)
                                .to(Users::Table, Users::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Tags::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Categories::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Categories {
        Table,
        Id,
        Name,
        UserId,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    pub(super) enum Tags {
        Table,
        Id,
        Name,
        UserId,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000003_create_products_table {

    use super::m20240101_000001_create_users_table::Users;
    use super::m20240101_000002_create_taxonomy_tables::{Categories, Tags};
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000003_create_products_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Products::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Products::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Products::Name).string_len(100).not_null())
                        .col(
                            ColumnDef::new(Products::Description)
                                .string_len(255)
                                .not_null(),
                        )
                        .col(ColumnDef::new(Products::Content).text().not_null())
                        .col(ColumnDef::new(Products::CategoryId).uuid().not_null())
                        .col(
                            ColumnDef::new(Products::Price)
                                .decimal_len(10, 2)
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Products::UserId).uuid().not_null())
                        .col(
                            ColumnDef::new(Products::ReceiveType)
                                .string_len(15)
                                .not_null()
                                .default("order"),
                        )
                        .col(ColumnDef::new(Products::Rating).decimal_len(2, 1).not_null())
                        .col(
                            ColumnDef::new(Products::IsPublished)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Products::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Products::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_products_category_id")
                                .from(Products::Table, Products::CategoryId)
                                .to(Categories::Table, Categories::Id)
                                .on_delete(ForeignKeyAction::Restrict)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_products_user_id")
                                .from(Products::Table, Products::UserId)
                                .to(Users::Table, Users::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            // Filter and ordering columns of the product listing
            for (name, column) in [
                ("idx_products_category_id", Products::CategoryId),
                ("idx_products_user_id", Products::UserId),
                ("idx_products_price", Products::Price),
                ("idx_products_created_at", Products::CreatedAt),
                ("idx_products_is_published", Products::IsPublished),
            ] {
                manager
                    .create_index(
                        Index::create()
                            .if_not_exists()
                            .name(name)
                            .table(Products::Table)
                            .col(column)
                            .to_owned(),
                    )
                    .await?;
            }

            manager
                .create_table(
                    Table::create()
                        .table(ProductTags::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(ProductTags::ProductId).uuid().not_null())
                        .col(ColumnDef::new(ProductTags::TagId).uuid().not_null())
                        .primary_key(
                            Index::create()
                                .col(ProductTags::ProductId)
                                .col(ProductTags::TagId),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_product_tags_product_id")
                                .from(ProductTags::Table, ProductTags::ProductId)
                                .to(Products::Table, Products::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_product_tags_tag_id")
                                .from(ProductTags::Table, ProductTags::TagId)
                                .to(Tags::Table, Tags::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_product_tags_tag_id")
                        .table(ProductTags::Table)
                        .col(ProductTags::TagId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ProductTags::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Products::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Products {
        Table,
        Id,
        Name,
        Description,
        Content,
        CategoryId,
        Price,
        UserId,
        ReceiveType,
        Rating,
        IsPublished,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum ProductTags {
        Table,
        ProductId,
        TagId,
    }
}

mod m20240101_000004_create_product_media_tables {

    use super::m20240101_000001_create_users_table::Users;
    use super::m20240101_000003_create_products_table::Products;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000004_create_product_media_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(ProductImages::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ProductImages::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ProductImages::ProductId).uuid().not_null())
                        .col(ColumnDef::new(ProductImages::Image).string().not_null())
                        .col(ColumnDef::new(ProductImages::UserId).uuid().not_null())
                        .col(
                            ColumnDef::new(ProductImages::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductImages::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_product_images_product_id")
                                .from(ProductImages::Table, ProductImages::ProductId)
                                .to(Products::Table, Products::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_product_images_user_id")
                                .from(ProductImages::Table, ProductImages::UserId)
                                .to(Users::Table, Users::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_product_images_product_id")
                        .table(ProductImages::Table)
                        .col(ProductImages::ProductId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(ProductAttributes::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ProductAttributes::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductAttributes::ProductId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductAttributes::Name)
                                .string_len(50)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductAttributes::Value)
                                .string_len(50)
                                .not_null(),
                        )
                        .col(ColumnDef::new(ProductAttributes::UserId).uuid().not_null())
                        .col(
                            ColumnDef::new(ProductAttributes::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductAttributes::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_product_attributes_product_id")
                                .from(ProductAttributes::Table, ProductAttributes::ProductId)
                                .to(Products::Table, Products::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_product_attributes_user_id")
                                .from(ProductAttributes::Table, ProductAttributes::UserId)
                                .to(Users::Table, Users::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_product_attributes_product_id")
                        .table(ProductAttributes::Table)
                        .col(ProductAttributes::ProductId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ProductAttributes::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(ProductImages::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum ProductImages {
        Table,
        Id,
        ProductId,
        Image,
        UserId,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum ProductAttributes {
        Table,
        Id,
        ProductId,
        Name,
        Value,
        UserId,
        CreatedAt,
        UpdatedAt,
    }
}
