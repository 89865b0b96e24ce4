use crate::models::Product;

/// Products shown on the storefront home page.
pub fn available(products: &[Product]) -> Vec<Product> {
    products.iter().filter(|p| p.is_available()).cloned().collect()
}

/// Active products of one category, including those out of stock.
pub fn in_category(products: &[Product], category: &str) -> Vec<Product> {
    products
        .iter()
        .filter(|p| p.category == category && p.is_active())
        .cloned()
        .collect()
}

/// Admin product table filter: case-insensitive name match, optionally narrowed to one
/// category. An empty term matches everything.
pub fn filter_for_admin(products: &[Product], term: &str, category: Option<&str>) -> Vec<Product> {
    let term = term.to_lowercase();
    products
        .iter()
        .filter(|p| p.name.to_lowercase().contains(&term))
        .filter(|p| category.is_none_or(|c| p.category == c))
        .cloned()
        .collect()
}
