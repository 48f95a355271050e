//! Fixed model instructions for receipt extraction.

/// System instruction. Fixes the JSON key set returned by the model.
pub const SYSTEM_PROMPT: &str = r#"You are an expert at parsing Norwegian receipts. Extract structured data from receipt images.

Return ONLY valid JSON with NO markdown formatting, NO code blocks, NO explanations - just pure JSON:
{
  "sellerName": "string or null",
  "sellerOrgNumber": "string or null",
  "sellerAddress": "string or null",
  "totalAmount": number or null,
  "subtotal": number or null,
  "vatAmount": number or null,
  "currency": "string",
  "receiptDate": "YYYY-MM-DD or null",
  "receiptNumber": "string or null",
  "items": [
    {
      "name": "string",
      "quantity": number or null,
      "unitPrice": number or null,
      "totalPrice": number or null
    }
  ],
  "paymentMethod": "string or null"
}

Important:
- Extract ALL line items
- MVA = VAT/moms
- Org numbers are 9 digits
- Currency is usually NOK
- Return valid JSON only"#;

/// User turn sent alongside the image.
pub const USER_PROMPT: &str =
    "Parse this Norwegian receipt and extract all information into structured JSON format.";

/// Confidence reported for every successful extraction.
pub const DEFAULT_CONFIDENCE: f64 = 0.9;
