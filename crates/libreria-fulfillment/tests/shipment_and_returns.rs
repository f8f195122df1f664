//! Integration tests for shipment transitions, cancellation, and the
//! return/refund workflow.

use chrono::{Duration, Utc};
use libreria_core::devolucion::{InspectionResult, ReturnState};
use libreria_core::sale::{PaymentState, SaleState};
use libreria_core::types::{Book, Card, CardType, Principal, ShippingType};
use libreria_fulfillment::{
    ErrorCode, Fulfillment, FulfillmentConfig, ReturnRequestItem,
};

fn book(id: &str, price_cents: i64) -> Book {
    Book {
        id: id.to_string(),
        title: format!("Book {}", id),
        author: "Autora".to_string(),
        price_cents,
        active: true,
    }
}

fn card(id: &str, owner_id: &str, balance_cents: i64) -> Card {
    Card {
        id: id.to_string(),
        owner_id: owner_id.to_string(),
        card_type: CardType::Debito,
        balance_cents,
        expiry_month: 12,
        expiry_year: 2099,
        active: true,
        is_default: true,
    }
}

fn pickup() -> ShippingType {
    ShippingType::RecogidaTienda {
        id_tienda: "tienda-1".to_string(),
    }
}

/// Seeds a service with one $40 book and a funded card, and creates a
/// paid sale for buyer u1. Tax disabled so the numbers stay readable.
async fn service_with_sale() -> (Fulfillment, Principal, Principal, String) {
    let config = FulfillmentConfig {
        tax_rate_bps: 0,
        ..FulfillmentConfig::default()
    };
    let svc = Fulfillment::new(config);
    svc.seed_book(book("b1", 4_000), 5).await;
    svc.payments().register_card(card("c1", "u1", 50_000)).await;

    let buyer = Principal::cliente("u1");
    let admin = Principal::administrador("admin-1");
    svc.add_to_cart(&buyer, "b1", 1).await.unwrap();
    let sale = svc.create_sale(&buyer, "c1", pickup(), false).await.unwrap();

    (svc, buyer, admin, sale.numero)
}

/// Walks a sale to entregado.
async fn deliver(svc: &Fulfillment, admin: &Principal, numero: &str) {
    svc.mark_ready(admin, numero).await.unwrap();
    svc.ship_sale(admin, numero, "TRK-1").await.unwrap();
    svc.deliver_sale(admin, numero).await.unwrap();
}

// =============================================================================
// Shipment
// =============================================================================

#[tokio::test]
async fn test_shipment_lifecycle() {
    let (svc, buyer, admin, numero) = service_with_sale().await;

    let sale = svc.mark_ready(&admin, &numero).await.unwrap();
    assert_eq!(sale.state, SaleState::ListoParaEnvio);

    let sale = svc.ship_sale(&admin, &numero, "TRK-42").await.unwrap();
    assert_eq!(sale.state, SaleState::Enviado);
    assert_eq!(sale.shipping.tracking.as_deref(), Some("TRK-42"));

    let sale = svc.deliver_sale(&admin, &numero).await.unwrap();
    assert_eq!(sale.state, SaleState::Entregado);
    assert!(sale.delivered_at.is_some());

    // owner sees the sale, a stranger does not
    assert!(svc.get_sale(&buyer, &numero).await.is_ok());
    let stranger = Principal::cliente("u9");
    assert_eq!(
        svc.get_sale(&stranger, &numero).await.unwrap_err().code,
        ErrorCode::Forbidden
    );
}

#[tokio::test]
async fn test_customer_cannot_drive_shipment() {
    let (svc, buyer, _admin, numero) = service_with_sale().await;
    let err = svc.mark_ready(&buyer, &numero).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::Forbidden);
}

#[tokio::test]
async fn test_ship_requires_tracking() {
    let (svc, _buyer, admin, numero) = service_with_sale().await;
    svc.mark_ready(&admin, &numero).await.unwrap();

    let err = svc.ship_sale(&admin, &numero, "  ").await.unwrap_err();
    assert_eq!(err.code, ErrorCode::ValidationFailed);
}

#[tokio::test]
async fn test_cancel_refunds_but_does_not_restock() {
    let (svc, buyer, _admin, numero) = service_with_sale().await;

    // the sale committed one copy: 4 left
    assert_eq!(svc.stock().record("b1").await.unwrap().available_qty, 4);

    let sale = svc
        .cancel_sale(&buyer, &numero, "cambió de opinión")
        .await
        .unwrap();
    assert_eq!(sale.state, SaleState::Cancelada);
    assert_eq!(sale.payment.state, PaymentState::ReembolsadoTotal);

    // money came back, the copy did not
    assert_eq!(svc.payments().get_card("c1").await.unwrap().balance_cents, 50_000);
    assert_eq!(svc.stock().record("b1").await.unwrap().available_qty, 4);
}

#[tokio::test]
async fn test_cancel_after_delivery_is_rejected() {
    let (svc, buyer, admin, numero) = service_with_sale().await;
    deliver(&svc, &admin, &numero).await;

    let err = svc
        .cancel_sale(&buyer, &numero, "tarde")
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidStateTransition);
}

// =============================================================================
// Returns
// =============================================================================

fn request(book_id: &str, quantity: i64) -> ReturnRequestItem {
    ReturnRequestItem {
        book_id: book_id.to_string(),
        quantity,
        reason: "llegó dañado".to_string(),
    }
}

#[tokio::test]
async fn test_return_requires_delivered_sale() {
    let (svc, buyer, _admin, numero) = service_with_sale().await;

    let err = svc
        .create_return(&buyer, &numero, vec![request("b1", 1)])
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidStateTransition);
}

#[tokio::test]
async fn test_return_window_expired() {
    let (svc, buyer, admin, numero) = service_with_sale().await;
    deliver(&svc, &admin, &numero).await;

    // backdate the delivery to nine days ago; the window is eight
    svc.sales()
        .update(&numero, |s| {
            s.delivered_at = Some(Utc::now() - Duration::days(9));
            Ok(())
        })
        .await
        .unwrap();

    let err = svc
        .create_return(&buyer, &numero, vec![request("b1", 1)])
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::ReturnWindowExpired);
}

#[tokio::test]
async fn test_cannot_return_more_than_purchased() {
    let (svc, buyer, admin, numero) = service_with_sale().await;
    deliver(&svc, &admin, &numero).await;

    let err = svc
        .create_return(&buyer, &numero, vec![request("b1", 2)])
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::ValidationFailed);
}

#[tokio::test]
async fn test_one_open_return_per_sale() {
    let (svc, buyer, admin, numero) = service_with_sale().await;
    deliver(&svc, &admin, &numero).await;

    svc.create_return(&buyer, &numero, vec![request("b1", 1)])
        .await
        .unwrap();
    let err = svc
        .create_return(&buyer, &numero, vec![request("b1", 1)])
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::ValidationFailed);
}

#[tokio::test]
async fn test_partial_refund_fifty_percent() {
    // the customer returns a $40 book; inspection approves 50%:
    // the card gets $20 back and the sale is partially refunded
    let (svc, buyer, admin, numero) = service_with_sale().await;
    deliver(&svc, &admin, &numero).await;

    let ret = svc
        .create_return(&buyer, &numero, vec![request("b1", 1)])
        .await
        .unwrap();
    assert_eq!(ret.state, ReturnState::Solicitada);
    assert_eq!(ret.totals.requested_refund_cents, 4_000);

    svc.approve_return(&admin, &ret.codigo).await.unwrap();
    svc.request_return_shipment(&admin, &ret.codigo).await.unwrap();
    svc.mark_return_in_transit(&buyer, &ret.codigo).await.unwrap();
    svc.receive_return(&admin, &ret.codigo).await.unwrap();

    let ret = svc
        .inspect_return_item(
            &admin,
            &ret.codigo,
            "b1",
            InspectionResult::AprobadoParcial,
            50,
        )
        .await
        .unwrap();
    assert_eq!(ret.state, ReturnState::ReembolsoAprobado);
    assert_eq!(ret.totals.approved_refund_cents, 2_000);

    let before = svc.payments().get_card("c1").await.unwrap().balance_cents;
    let ret = svc.process_refund(&admin, &ret.codigo).await.unwrap();
    assert_eq!(ret.state, ReturnState::ReembolsoCompletado);
    assert_eq!(ret.totals.refunded_cents, 2_000);

    // card +$20, sale partially refunded, inspected copy restocked
    let after = svc.payments().get_card("c1").await.unwrap().balance_cents;
    assert_eq!(after - before, 2_000);
    let sale = svc.get_sale(&buyer, &numero).await.unwrap();
    assert_eq!(sale.payment.state, PaymentState::ReembolsadoParcial);
    assert_eq!(sale.payment.refunded_cents, 2_000);
    assert_eq!(svc.stock().record("b1").await.unwrap().available_qty, 5);

    let ret = svc.close_return(&admin, &ret.codigo).await.unwrap();
    assert_eq!(ret.state, ReturnState::Cerrada);
}

#[tokio::test]
async fn test_rejected_inspection_closes_without_refund_or_restock() {
    let (svc, buyer, admin, numero) = service_with_sale().await;
    deliver(&svc, &admin, &numero).await;

    let ret = svc
        .create_return(&buyer, &numero, vec![request("b1", 1)])
        .await
        .unwrap();
    svc.approve_return(&admin, &ret.codigo).await.unwrap();
    svc.request_return_shipment(&admin, &ret.codigo).await.unwrap();
    svc.mark_return_in_transit(&buyer, &ret.codigo).await.unwrap();
    svc.receive_return(&admin, &ret.codigo).await.unwrap();

    let ret = svc
        .inspect_return_item(&admin, &ret.codigo, "b1", InspectionResult::Rechazado, 0)
        .await
        .unwrap();

    // nothing approved: straight to cerrada, no refund, no restock
    assert_eq!(ret.state, ReturnState::Cerrada);
    assert_eq!(ret.totals.approved_refund_cents, 0);
    assert_eq!(
        svc.payments().get_card("c1").await.unwrap().balance_cents,
        50_000 - 4_000
    );
    assert_eq!(svc.stock().record("b1").await.unwrap().available_qty, 4);
}

#[tokio::test]
async fn test_inspecting_item_not_in_return_leaves_state_alone() {
    // b2 was bought but not returned: inspecting it fails and the return
    // stays in recibida instead of slipping into en_inspeccion
    let config = FulfillmentConfig {
        tax_rate_bps: 0,
        ..FulfillmentConfig::default()
    };
    let svc = Fulfillment::new(config);
    svc.seed_book(book("b1", 4_000), 5).await;
    svc.seed_book(book("b2", 3_000), 5).await;
    svc.payments().register_card(card("c1", "u1", 50_000)).await;

    let buyer = Principal::cliente("u1");
    let admin = Principal::administrador("admin-1");
    svc.add_to_cart(&buyer, "b1", 1).await.unwrap();
    svc.add_to_cart(&buyer, "b2", 1).await.unwrap();
    let sale = svc.create_sale(&buyer, "c1", pickup(), false).await.unwrap();
    deliver(&svc, &admin, &sale.numero).await;

    let ret = svc
        .create_return(&buyer, &sale.numero, vec![request("b1", 1)])
        .await
        .unwrap();
    svc.approve_return(&admin, &ret.codigo).await.unwrap();
    svc.request_return_shipment(&admin, &ret.codigo).await.unwrap();
    svc.mark_return_in_transit(&buyer, &ret.codigo).await.unwrap();
    svc.receive_return(&admin, &ret.codigo).await.unwrap();

    let err = svc
        .inspect_return_item(&admin, &ret.codigo, "b2", InspectionResult::Aprobado, 0)
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::NotFound);

    // still awaiting a real inspection
    let ret = svc.get_return(&admin, &ret.codigo).await.unwrap();
    assert_eq!(ret.state, ReturnState::Recibida);
}

#[tokio::test]
async fn test_cancel_return_only_before_shipping_back() {
    let (svc, buyer, admin, numero) = service_with_sale().await;
    deliver(&svc, &admin, &numero).await;

    let ret = svc
        .create_return(&buyer, &numero, vec![request("b1", 1)])
        .await
        .unwrap();
    svc.approve_return(&admin, &ret.codigo).await.unwrap();

    // still cancellable while aprobada
    let ret2 = svc
        .cancel_return(&buyer, &ret.codigo, "me arrepentí")
        .await
        .unwrap();
    assert_eq!(ret2.state, ReturnState::Cancelada);

    // a cancelled return frees the sale for a new request
    let ret3 = svc
        .create_return(&buyer, &numero, vec![request("b1", 1)])
        .await
        .unwrap();
    svc.approve_return(&admin, &ret3.codigo).await.unwrap();
    svc.request_return_shipment(&admin, &ret3.codigo).await.unwrap();

    let err = svc
        .cancel_return(&buyer, &ret3.codigo, "tarde")
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidStateTransition);
}

#[tokio::test]
async fn test_customer_cannot_inspect_or_refund() {
    let (svc, buyer, admin, numero) = service_with_sale().await;
    deliver(&svc, &admin, &numero).await;

    let ret = svc
        .create_return(&buyer, &numero, vec![request("b1", 1)])
        .await
        .unwrap();

    let err = svc.approve_return(&buyer, &ret.codigo).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::Forbidden);
    let err = svc
        .inspect_return_item(&buyer, &ret.codigo, "b1", InspectionResult::Aprobado, 0)
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::Forbidden);
    let err = svc.process_refund(&buyer, &ret.codigo).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::Forbidden);
}
