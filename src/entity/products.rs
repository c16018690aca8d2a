use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "products")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub sku: String,
    #[sea_orm(unique)]
    pub barcode: Option<String>,
    pub name: String,
    pub description: Option<String>,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub price: Decimal,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub cost_price: Decimal,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub profit_margin: Decimal,
    pub quantity: i32,
    pub min_quantity: i32,
    pub category: Option<String>,
    pub is_active: bool,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::sale_items::Entity")]
    SaleItems,
    #[sea_orm(has_many = "super::inventory_history::Entity")]
    InventoryHistory,
}

impl Related<super::sale_items::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SaleItems.def()
    }
}

impl Related<super::inventory_history::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::InventoryHistory.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
