mod m0001_receipts;
mod m0002_receipt_lookup_indexes;

use cetane::prelude::MigrationRegistry;

pub fn registry() -> MigrationRegistry {
    let mut reg = MigrationRegistry::new();
    reg.register(m0001_receipts::migration());
    reg.register(m0002_receipt_lookup_indexes::migration());
    reg
}
