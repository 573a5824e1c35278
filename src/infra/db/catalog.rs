use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};

use crate::{
    application::repos::{CatalogRepo, RepoError, SearchQuery},
    domain::entities::{
        CatalogProduct, CategoryRecord, CategoryTree, CollectionRecord, CollectionWithCategories,
        ProductRecord, SearchHit, SubcategoryRecord, SubcollectionRecord,
        SubcollectionWithSubcategories, product_href,
    },
};

use super::{
    PostgresRepositories,
    util::{escape_like, map_sqlx_error},
};

const PRODUCT_COLUMNS: &str =
    "p.slug, p.name, p.description, p.price, p.subcategory_slug, p.image_url";

#[derive(sqlx::FromRow)]
struct CollectionRow {
    id: i32,
    name: String,
    slug: String,
}

impl From<CollectionRow> for CollectionRecord {
    fn from(row: CollectionRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            slug: row.slug,
        }
    }
}

#[derive(sqlx::FromRow)]
struct CategoryRow {
    slug: String,
    name: String,
    collection_id: i32,
    image_url: Option<String>,
}

impl From<CategoryRow> for CategoryRecord {
    fn from(row: CategoryRow) -> Self {
        Self {
            slug: row.slug,
            name: row.name,
            collection_id: row.collection_id,
            image_url: row.image_url,
        }
    }
}

#[derive(sqlx::FromRow)]
struct SubcollectionRow {
    id: i32,
    name: String,
    category_slug: String,
}

#[derive(sqlx::FromRow)]
struct SubcategoryRow {
    slug: String,
    name: String,
    subcollection_id: i32,
    image_url: Option<String>,
}

impl From<SubcategoryRow> for SubcategoryRecord {
    fn from(row: SubcategoryRow) -> Self {
        Self {
            slug: row.slug,
            name: row.name,
            subcollection_id: row.subcollection_id,
            image_url: row.image_url,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ProductRow {
    slug: String,
    name: String,
    description: String,
    price: String,
    subcategory_slug: String,
    image_url: Option<String>,
}

impl From<ProductRow> for ProductRecord {
    fn from(row: ProductRow) -> Self {
        Self {
            slug: row.slug,
            name: row.name,
            description: row.description,
            price: row.price,
            subcategory_slug: row.subcategory_slug,
            image_url: row.image_url,
        }
    }
}

#[derive(sqlx::FromRow)]
struct CatalogProductRow {
    #[sqlx(flatten)]
    product: ProductRow,
    category_slug: String,
}

impl From<CatalogProductRow> for CatalogProduct {
    fn from(row: CatalogProductRow) -> Self {
        Self {
            product: row.product.into(),
            category_slug: row.category_slug,
        }
    }
}

impl PostgresRepositories {
    async fn attach_categories(
        &self,
        collections: Vec<CollectionRow>,
    ) -> Result<Vec<CollectionWithCategories>, RepoError> {
        if collections.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<i32> = collections.iter().map(|row| row.id).collect();
        let categories = sqlx::query_as::<_, CategoryRow>(
            "SELECT slug, name, collection_id, image_url \
             FROM categories WHERE collection_id = ANY($1) ORDER BY name ASC",
        )
        .bind(&ids)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        let mut by_collection: HashMap<i32, Vec<CategoryRecord>> = HashMap::new();
        for row in categories {
            by_collection
                .entry(row.collection_id)
                .or_default()
                .push(row.into());
        }

        Ok(collections
            .into_iter()
            .map(|row| CollectionWithCategories {
                categories: by_collection.remove(&row.id).unwrap_or_default(),
                collection: row.into(),
            })
            .collect())
    }
}

fn push_search_filter<'q>(qb: &mut QueryBuilder<'q, Postgres>, query: &SearchQuery) {
    match query {
        SearchQuery::Prefix(term) => {
            qb.push("lower(p.name) LIKE ");
            qb.push_bind(format!("{}%", escape_like(term)));
        }
        SearchQuery::AnyWord(words) => {
            qb.push("(");
            for (index, word) in words.iter().enumerate() {
                if index > 0 {
                    qb.push(" OR ");
                }
                qb.push("lower(p.name) LIKE ");
                qb.push_bind(format!("%{}%", escape_like(word)));
            }
            qb.push(")");
        }
    }
}

#[async_trait]
impl CatalogRepo for PostgresRepositories {
    async fn list_collections(&self) -> Result<Vec<CollectionWithCategories>, RepoError> {
        let rows = sqlx::query_as::<_, CollectionRow>(
            "SELECT id, name, slug FROM collections ORDER BY name ASC",
        )
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        self.attach_categories(rows).await
    }

    async fn find_collection(
        &self,
        slug: &str,
    ) -> Result<Vec<CollectionWithCategories>, RepoError> {
        let rows = sqlx::query_as::<_, CollectionRow>(
            "SELECT id, name, slug FROM collections WHERE slug = $1 ORDER BY slug ASC",
        )
        .bind(slug)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        self.attach_categories(rows).await
    }

    async fn find_category_tree(&self, slug: &str) -> Result<Option<CategoryTree>, RepoError> {
        let Some(category) = sqlx::query_as::<_, CategoryRow>(
            "SELECT slug, name, collection_id, image_url FROM categories WHERE slug = $1",
        )
        .bind(slug)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?
        else {
            return Ok(None);
        };

        let subcollections = sqlx::query_as::<_, SubcollectionRow>(
            "SELECT id, name, category_slug FROM subcollections \
             WHERE category_slug = $1 ORDER BY id ASC",
        )
        .bind(slug)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        let ids: Vec<i32> = subcollections.iter().map(|row| row.id).collect();
        let subcategories = sqlx::query_as::<_, SubcategoryRow>(
            "SELECT slug, name, subcollection_id, image_url FROM subcategories \
             WHERE subcollection_id = ANY($1) ORDER BY slug ASC",
        )
        .bind(&ids)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        let mut by_subcollection: HashMap<i32, Vec<SubcategoryRecord>> = HashMap::new();
        for row in subcategories {
            by_subcollection
                .entry(row.subcollection_id)
                .or_default()
                .push(row.into());
        }

        let subcollections = subcollections
            .into_iter()
            .map(|row| SubcollectionWithSubcategories {
                subcategories: by_subcollection.remove(&row.id).unwrap_or_default(),
                subcollection: SubcollectionRecord {
                    id: row.id,
                    name: row.name,
                    category_slug: row.category_slug,
                },
            })
            .collect();

        Ok(Some(CategoryTree {
            category: category.into(),
            subcollections,
        }))
    }

    async fn count_products_in_category(&self, slug: &str) -> Result<u64, RepoError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(p.slug) FROM categories c \
             LEFT JOIN subcollections sc ON sc.category_slug = c.slug \
             LEFT JOIN subcategories sub ON sub.subcollection_id = sc.id \
             LEFT JOIN products p ON p.subcategory_slug = sub.slug \
             WHERE c.slug = $1",
        )
        .bind(slug)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(count.max(0) as u64)
    }

    async fn list_products_in_subcategory(
        &self,
        slug: &str,
    ) -> Result<Vec<ProductRecord>, RepoError> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products p \
             WHERE p.subcategory_slug = $1 ORDER BY p.slug ASC"
        ))
        .bind(slug)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(ProductRecord::from).collect())
    }

    async fn count_products_in_subcategory(&self, slug: &str) -> Result<u64, RepoError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE subcategory_slug = $1")
                .bind(slug)
                .fetch_one(self.pool())
                .await
                .map_err(map_sqlx_error)?;

        Ok(count.max(0) as u64)
    }

    async fn find_product(&self, slug: &str) -> Result<Option<ProductRecord>, RepoError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products p WHERE p.slug = $1"
        ))
        .bind(slug)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(ProductRecord::from))
    }

    async fn count_products(&self) -> Result<u64, RepoError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(count.max(0) as u64)
    }

    async fn search_products(
        &self,
        query: &SearchQuery,
        limit: u32,
    ) -> Result<Vec<SearchHit>, RepoError> {
        let mut qb = QueryBuilder::new(format!(
            "SELECT {PRODUCT_COLUMNS}, c.slug AS category_slug \
             FROM products p \
             INNER JOIN subcategories sub ON sub.slug = p.subcategory_slug \
             INNER JOIN subcollections sc ON sc.id = sub.subcollection_id \
             INNER JOIN categories c ON c.slug = sc.category_slug \
             WHERE "
        ));
        push_search_filter(&mut qb, query);
        qb.push(" ORDER BY p.name ASC LIMIT ");
        qb.push_bind(i64::from(limit));

        let rows = qb
            .build_query_as::<CatalogProductRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let product = CatalogProduct::from(row);
                SearchHit {
                    href: product_href(
                        &product.category_slug,
                        &product.product.subcategory_slug,
                        &product.product.slug,
                    ),
                    product: product.product,
                }
            })
            .collect())
    }

    async fn find_products_by_slugs(
        &self,
        slugs: &[String],
    ) -> Result<Vec<CatalogProduct>, RepoError> {
        if slugs.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query_as::<_, CatalogProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS}, c.slug AS category_slug \
             FROM products p \
             INNER JOIN subcategories sub ON sub.slug = p.subcategory_slug \
             INNER JOIN subcollections sc ON sc.id = sub.subcollection_id \
             INNER JOIN categories c ON c.slug = sc.category_slug \
             WHERE p.slug = ANY($1)"
        ))
        .bind(slugs)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(CatalogProduct::from).collect())
    }
}
