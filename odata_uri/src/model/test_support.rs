//! Shared fixture model for unit tests

use super::edm::{EdmModel, ModelDocument};
use super::elements::{
    EntitySet, EnumType, NavigationProperty, Operation, OperationImport, Singleton,
    StructuralProperty, StructuredType,
};

fn prop(name: &str, type_name: &str) -> StructuralProperty {
    StructuralProperty::new(name, type_name)
}

pub fn sample_document() -> ModelDocument {
    ModelDocument::new()
        .with_enum(EnumType::new("NS.Color", &["Red", "Green", "Blue"]))
        .with_type(
            StructuredType::complex("NS.Address")
                .with_property(prop("Street", "Edm.String"))
                .with_property(prop("Zip", "Edm.String"))
                .with_property(prop("WorkAddress", "NS.Address"))
                .with_navigation(NavigationProperty::single("City", "NS.City")),
        )
        .with_type(
            StructuredType::complex("NS.WorkAddress")
                .with_base("NS.Address")
                .with_property(prop("Company", "Edm.String"))
                .with_navigation(NavigationProperty::single("City2", "NS.City")),
        )
        .with_type(
            StructuredType::entity("NS.City")
                .with_key(&["Id"])
                .with_property(prop("Id", "Edm.Int32"))
                .with_property(prop("Name", "Edm.String"))
                .with_property(prop("Population", "Edm.Int64"))
                .with_property(prop("Area", "Edm.Double"))
                .with_property(prop("Budget", "Edm.Decimal"))
                .with_property(prop("Founded", "Edm.Date"))
                .with_property(prop("Color", "NS.Color"))
                .with_property(prop("Tags", "Collection(Edm.String)"))
                .with_navigation(NavigationProperty::collection("Districts", "NS.District")),
        )
        .with_type(
            StructuredType::entity("NS.District")
                .with_key(&["Id"])
                .with_property(prop("Id", "Edm.Int32"))
                .with_property(prop("Name", "Edm.String"))
                .with_property(prop("Zip", "Edm.String"))
                .with_navigation(NavigationProperty::single("City", "NS.City")),
        )
        .with_type(
            StructuredType::entity("NS.Person")
                .open()
                .with_key(&["Id"])
                .with_property(prop("Id", "Edm.Int32"))
                .with_property(prop("Name", "Edm.String"))
                .with_property(prop("Age", "Edm.Int32"))
                .with_property(prop("Address", "NS.Address"))
                .with_property(prop("Addresses", "Collection(NS.Address)"))
                .with_navigation(NavigationProperty::collection("Friends", "NS.Person"))
                .with_navigation(NavigationProperty::collection("Trips", "NS.Trip").contained())
                .with_navigation(NavigationProperty::single("HomeCity", "NS.City")),
        )
        .with_type(
            StructuredType::entity("NS.Trip")
                .with_key(&["TripId"])
                .with_property(prop("TripId", "Edm.Int32"))
                .with_property(prop("Description", "Edm.String"))
                .with_property(prop("Budget", "Edm.Decimal")),
        )
        .with_type(
            StructuredType::entity("NS.Customer")
                .with_key(&["Id"])
                .with_property(prop("Id", "Edm.Int32"))
                .with_property(prop("Name", "Edm.String"))
                .with_navigation(NavigationProperty::collection("Orders", "NS.Order")),
        )
        .with_type(
            StructuredType::entity("NS.VipCustomer")
                .with_base("NS.Customer")
                .with_property(prop("VipLevel", "Edm.Int32")),
        )
        .with_type(StructuredType::entity("NS.NormalCustomer").with_base("NS.Customer"))
        .with_type(
            StructuredType::entity("NS.Order")
                .with_key(&["OrderId"])
                .with_property(prop("OrderId", "Edm.Int32"))
                .with_property(prop("Amount", "Edm.Decimal"))
                .with_property(prop("Quantity", "Edm.Int32"))
                .with_property(prop("Price", "Edm.Double"))
                .with_navigation(
                    NavigationProperty::single("Customer", "NS.Customer")
                        .with_constraints(&["NS.VipCustomer"]),
                ),
        )
        .with_type(
            StructuredType::entity("NS.Photo")
                .media()
                .with_key(&["Id"])
                .with_property(prop("Id", "Edm.Int64"))
                .with_property(prop("Caption", "Edm.String")),
        )
        .with_type(
            StructuredType::entity("NS.Product")
                .with_key(&["Id", "Code"])
                .with_property(prop("Id", "Edm.Int32"))
                .with_property(prop("Code", "Edm.String"))
                .with_property(prop("Released", "Edm.DateTimeOffset")),
        )
        .with_entity_set(EntitySet::new("Cities", "NS.City").with_binding("Districts", "Districts"))
        .with_entity_set(EntitySet::new("Districts", "NS.District").with_binding("City", "Cities"))
        .with_entity_set(
            EntitySet::new("People", "NS.Person")
                .with_binding("Friends", "People")
                .with_binding("HomeCity", "Cities")
                .with_binding("Address/City", "Cities")
                .with_binding("Addresses/City", "Cities"),
        )
        .with_entity_set(EntitySet::new("Customers", "NS.Customer").with_binding("Orders", "Orders"))
        .with_entity_set(EntitySet::new("Orders", "NS.Order").with_binding("Customer", "Customers"))
        .with_entity_set(EntitySet::new("Photos", "NS.Photo"))
        .with_entity_set(EntitySet::new("Products", "NS.Product"))
        .with_singleton(
            Singleton::new("Me", "NS.Person")
                .with_binding("Friends", "People")
                .with_binding("HomeCity", "Cities")
                .with_binding("Address/City", "Cities")
                .with_binding("Address/WorkAddress/NS.WorkAddress/City2", "Cities"),
        )
        .with_singleton(Singleton::new("TopCustomer", "NS.Customer").with_constraints(&["NS.VipCustomer"]))
        .with_operation(
            Operation::function("NS.GetTopCities")
                .with_parameter("count", "Edm.Int32")
                .returns("Collection(NS.City)")
                .composable(),
        )
        .with_operation(
            Operation::function("NS.MostPopulous")
                .bound_to("Collection(NS.City)")
                .returns("NS.City")
                .composable()
                .with_entity_set_path("bindingParameter"),
        )
        .with_operation(
            Operation::function("NS.GetDistrictCount")
                .bound_to("NS.City")
                .returns("Edm.Int32"),
        )
        .with_operation(
            Operation::action("NS.Rate")
                .bound_to("NS.City")
                .with_parameter("rating", "Edm.Int32"),
        )
        .with_operation(Operation::action("NS.ResetData"))
        .with_operation_import(OperationImport::new("GetTopCities", "NS.GetTopCities").with_entity_set("Cities"))
        .with_operation_import(OperationImport::new("ResetData", "NS.ResetData"))
}

pub fn sample_model() -> EdmModel {
    match EdmModel::from_document(sample_document()) {
        Ok(model) => model,
        Err(e) => panic!("fixture model is invalid: {}", e),
    }
}
