//! Compiled-in site content. Every section resolves to one of these values when
//! storage is empty, unreadable or holds something of the wrong shape.

use serde_json::{json, Value};
use site_types::{ContentTree, SectionKey};

pub fn default_section(key: SectionKey) -> Value {
    match key {
        SectionKey::HomePage => json!({
            "hero": {
                "title": "Clarity for your numbers",
                "subtitle": "Accounting, tax and advisory for growing businesses",
                "ctaText": "Book a consultation",
                "ctaLink": "/contact",
                "backgroundImage": ""
            },
            "stats": [
                { "label": "Clients served", "value": "250+" },
                { "label": "Years in practice", "value": "15" },
                { "label": "Filings per year", "value": "1,200" },
                { "label": "Client retention", "value": "96%" }
            ],
            "intro": {
                "heading": "Why work with us",
                "body": "We keep your books accurate and your decisions informed."
            }
        }),
        SectionKey::About => json!({
            "title": "About the firm",
            "mission": "Give every client the financial visibility of a large company.",
            "story": "Founded by two chartered accountants, the firm has grown with its clients.",
            "values": ["Accuracy", "Transparency", "Responsiveness"]
        }),
        SectionKey::Services => json!([
            {
                "id": 1,
                "title": "Bookkeeping",
                "description": "Monthly reconciliation and clean ledgers.",
                "icon": "book",
                "features": ["Bank reconciliation", "Accounts payable", "Monthly close"]
            },
            {
                "id": 2,
                "title": "Tax Planning & Filing",
                "description": "Corporate and personal returns, planned ahead of deadlines.",
                "icon": "file-text",
                "features": ["Corporate tax", "VAT returns", "Personal tax"]
            },
            {
                "id": 3,
                "title": "Payroll",
                "description": "Accurate, on-time payroll and statutory filings.",
                "icon": "users",
                "features": ["Payslips", "Pension contributions", "Year-end forms"]
            },
            {
                "id": 4,
                "title": "Financial Advisory",
                "description": "Budgets, forecasts and cash-flow planning.",
                "icon": "trending-up",
                "features": ["Forecasting", "Budgeting", "KPI dashboards"]
            },
            {
                "id": 5,
                "title": "Audit & Assurance",
                "description": "Independent review of your financial statements.",
                "icon": "shield",
                "features": ["Statutory audit", "Internal controls", "Due diligence"]
            }
        ]),
        SectionKey::Team => json!([
            {
                "id": 1,
                "name": "Amina Okafor",
                "position": "Managing Partner",
                "bio": "Chartered accountant with twenty years in practice.",
                "photo": "",
                "email": "amina@example.com"
            },
            {
                "id": 2,
                "name": "Daniel Reyes",
                "position": "Head of Tax",
                "bio": "Specialist in corporate and cross-border tax.",
                "photo": "",
                "email": "daniel@example.com"
            },
            {
                "id": 3,
                "name": "Mei Tanaka",
                "position": "Senior Advisor",
                "bio": "Leads forecasting and advisory engagements.",
                "photo": "",
                "email": "mei@example.com"
            }
        ]),
        SectionKey::Clients => json!([
            { "id": 1, "name": "Northwind Traders", "logo": "", "industry": "Retail" },
            { "id": 2, "name": "Contoso Health", "logo": "", "industry": "Healthcare" },
            { "id": 3, "name": "Fabrikam Build", "logo": "", "industry": "Construction" }
        ]),
        SectionKey::Gallery => json!([
            { "id": 1, "title": "Our office", "image": "", "category": "office" },
            { "id": 2, "title": "Annual client seminar", "image": "", "category": "events" }
        ]),
        SectionKey::Testimonials => json!([
            {
                "id": 1,
                "name": "J. Harper",
                "company": "Northwind Traders",
                "text": "Our month-end close went from two weeks to three days.",
                "rating": 5
            },
            {
                "id": 2,
                "name": "L. Moreau",
                "company": "Contoso Health",
                "text": "Clear advice and no surprises at tax time.",
                "rating": 5
            },
            {
                "id": 3,
                "name": "R. Singh",
                "company": "Fabrikam Build",
                "text": "The forecasting work changed how we bid on projects.",
                "rating": 4
            }
        ]),
        SectionKey::Contact => json!({
            "address": "12 Ledger Street, Suite 400",
            "phone": "+1 555 0100",
            "email": "hello@example.com",
            "hours": "Mon-Fri 9:00-17:30",
            "mapEmbedUrl": "",
            "social": { "linkedin": "", "twitter": "", "facebook": "" }
        }),
        SectionKey::Faq => json!([
            {
                "id": 1,
                "question": "Do you work with small businesses?",
                "answer": "Yes, most of our clients have fewer than fifty employees."
            },
            {
                "id": 2,
                "question": "How are fees structured?",
                "answer": "Fixed monthly fees agreed up front, with no hourly surprises."
            },
            {
                "id": 3,
                "question": "Can you take over from our current accountant?",
                "answer": "We handle the handover, including prior-year records."
            },
            {
                "id": 4,
                "question": "Do you offer remote services?",
                "answer": "All services are available remotely with secure document sharing."
            }
        ]),
        SectionKey::Theme => json!({
            "primaryColor": "#1e3a5f",
            "secondaryColor": "#c9a227",
            "accentColor": "#2e8b57",
            "fontFamily": "Inter, sans-serif",
            "logo": ""
        }),
        SectionKey::Seo => json!({
            "title": "Financial & Accounting Consultancy",
            "description": "Bookkeeping, tax, payroll and advisory services.",
            "keywords": ["accounting", "tax", "bookkeeping", "advisory"]
        }),
    }
}

pub fn default_tree() -> ContentTree {
    SectionKey::ALL
        .iter()
        .map(|k| (k.as_str().to_string(), default_section(*k)))
        .collect()
}
