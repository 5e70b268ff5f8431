//! Order pricing engine.
//!
//! Pure validation and total computation over client line items and the
//! product records fetched for them. All arithmetic uses [`Decimal`], so
//! totals are exact; nothing here touches storage.

use std::collections::HashMap;

use model::{LineItem, PricedItem, Product};
use rust_decimal::Decimal;

use crate::ServiceError;

/// Validates the line items and computes the order total.
///
/// Validation happens before any write, in input order: every product id must
/// resolve in `products`, every quantity must be greater than zero. The first
/// violation aborts the whole order.
///
/// On success returns the total together with the materialized items, each
/// carrying the product price snapshotted at this moment.
pub fn price_items(
    items: &[LineItem],
    products: &HashMap<i64, Product>,
) -> Result<(Decimal, Vec<PricedItem>), ServiceError> {
    if items.is_empty() {
        return Err(ServiceError::InvalidInput(
            "items is required and cannot be empty".into(),
        ));
    }

    let mut total = Decimal::ZERO;
    let mut priced = Vec::with_capacity(items.len());

    for item in items {
        let product = products.get(&item.product_id).ok_or_else(|| {
            ServiceError::NotFound(format!("product {} not found", item.product_id))
        })?;

        if item.quantity <= 0 {
            return Err(ServiceError::InvalidInput(
                "quantity must be greater than 0".into(),
            ));
        }

        let item_total = product.price * Decimal::from(item.quantity);
        total += item_total;

        priced.push(PricedItem {
            product_id: item.product_id,
            quantity: item.quantity,
            price: product.price,
        });
    }

    Ok((total, priced))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(id: i64, price: Decimal) -> Product {
        Product {
            product_id: id,
            name: format!("product-{id}"),
            price,
        }
    }

    fn catalog(products: &[Product]) -> HashMap<i64, Product> {
        products
            .iter()
            .map(|p| (p.product_id, p.clone()))
            .collect()
    }

    #[test]
    fn test_total_is_exact_decimal_sum() {
        let products = catalog(&[
            product(1, Decimal::new(500, 2)),  // 5.00
            product(2, Decimal::new(350, 2)),  // 3.50
        ]);
        let items = vec![
            LineItem { product_id: 1, quantity: 2 },
            LineItem { product_id: 2, quantity: 1 },
        ];

        let (total, priced) = price_items(&items, &products).unwrap();
        assert_eq!(total, Decimal::new(1350, 2)); // exactly 13.50
        assert_eq!(priced.len(), 2);
        assert_eq!(priced[0].price, Decimal::new(500, 2));
        assert_eq!(priced[1].quantity, 1);
    }

    #[test]
    fn test_price_snapshot_comes_from_catalog() {
        let products = catalog(&[product(9, Decimal::new(1000, 2))]);
        let items = vec![LineItem { product_id: 9, quantity: 3 }];

        let (total, priced) = price_items(&items, &products).unwrap();
        assert_eq!(priced[0].price, Decimal::new(1000, 2));
        assert_eq!(total, Decimal::new(3000, 2));
    }

    #[test]
    fn test_empty_items_rejected() {
        let products = HashMap::new();
        let err = price_items(&[], &products).unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }

    #[test]
    fn test_unknown_product_rejected() {
        let products = catalog(&[product(1, Decimal::ONE)]);
        let items = vec![
            LineItem { product_id: 1, quantity: 1 },
            LineItem { product_id: 777, quantity: 1 },
        ];
        let err = price_items(&items, &products).unwrap_err();
        match err {
            ServiceError::NotFound(msg) => assert!(msg.contains("777")),
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_zero_and_negative_quantity_rejected() {
        let products = catalog(&[product(1, Decimal::ONE)]);
        for qty in [0, -1] {
            let items = vec![LineItem { product_id: 1, quantity: qty }];
            let err = price_items(&items, &products).unwrap_err();
            assert!(matches!(err, ServiceError::InvalidInput(_)), "qty {qty}");
        }
    }

    #[test]
    fn test_one_bad_item_fails_whole_order() {
        let products = catalog(&[product(1, Decimal::ONE), product(2, Decimal::ONE)]);
        let items = vec![
            LineItem { product_id: 1, quantity: 1 },
            LineItem { product_id: 2, quantity: 0 },
        ];
        assert!(price_items(&items, &products).is_err());
    }

    #[test]
    fn test_missing_product_checked_before_quantity_per_item() {
        // For a single item both violations could apply; the product lookup
        // is checked first, matching the per-item validation order.
        let products = HashMap::new();
        let items = vec![LineItem { product_id: 5, quantity: 0 }];
        let err = price_items(&items, &products).unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[test]
    fn test_items_validated_in_input_order() {
        // The first offending item wins: item 0 has a bad quantity, item 1 an
        // unknown product.
        let products = catalog(&[product(1, Decimal::ONE)]);
        let items = vec![
            LineItem { product_id: 1, quantity: -2 },
            LineItem { product_id: 404, quantity: 1 },
        ];
        let err = price_items(&items, &products).unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }
}
