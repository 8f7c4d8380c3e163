// src/services/pricing.rs

use std::collections::HashMap;

use uuid::Uuid;

use crate::{
    common::{
        error::{AppError, Resource},
        money,
    },
    models::{
        payment::{DraftLine, SaleDraft},
        product::{CartItem, Product},
    },
};

/// Junta linhas repetidas do mesmo produto, mantendo a ordem da primeira aparição.
pub fn merge_cart(items: &[CartItem]) -> Result<Vec<CartItem>, AppError> {
    if items.is_empty() {
        return Err(AppError::EmptyCart);
    }

    let mut merged: Vec<CartItem> = Vec::with_capacity(items.len());
    let mut positions: HashMap<Uuid, usize> = HashMap::new();

    for item in items {
        if item.quantity <= 0 {
            return Err(AppError::InvalidInput(format!(
                "quantidade inválida para o produto {}",
                item.product_id
            )));
        }

        match positions.get(&item.product_id) {
            Some(&idx) => {
                let line = &mut merged[idx];
                line.quantity = line
                    .quantity
                    .checked_add(item.quantity)
                    .ok_or_else(|| AppError::InvalidInput("quantidade excessiva".into()))?;
            }
            None => {
                positions.insert(item.product_id, merged.len());
                merged.push(*item);
            }
        }
    }

    Ok(merged)
}

/// Precifica o carrinho (já consolidado) com os preços do servidor e confere o estoque.
/// A conferência aqui é só para falhar cedo; o débito real é condicional na confirmação.
pub fn build_draft(
    cart: &[CartItem],
    products: &[Product],
    allow_negative_stock: bool,
) -> Result<SaleDraft, AppError> {
    let catalog: HashMap<Uuid, &Product> = products.iter().map(|p| (p.id, p)).collect();

    let mut lines = Vec::with_capacity(cart.len());
    let mut total_cents: i64 = 0;

    for item in cart {
        let product = catalog
            .get(&item.product_id)
            .filter(|p| p.active)
            .ok_or(AppError::ResourceNotFound(Resource::Product))?;

        if !allow_negative_stock && product.stock < item.quantity {
            return Err(AppError::InsufficientStock {
                product_id: product.id,
                product_name: product.name.clone(),
            });
        }

        let unit_price_cents = money::to_cents(product.price)
            .ok_or_else(|| AppError::InvalidInput(format!("preço inválido para {}", product.name)))?;
        let line_total = money::line_total(unit_price_cents, item.quantity)
            .ok_or_else(|| AppError::InvalidInput("valor da linha excede o limite".into()))?;
        total_cents = total_cents
            .checked_add(line_total)
            .ok_or_else(|| AppError::InvalidInput("valor total excede o limite".into()))?;

        lines.push(DraftLine {
            product_id: product.id,
            product_name: product.name.clone(),
            quantity: item.quantity,
            unit_price_cents,
            total_cents: line_total,
        });
    }

    Ok(SaleDraft { lines, total_cents })
}
