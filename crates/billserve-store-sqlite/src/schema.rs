//! SQL schema for the billserve SQLite store.
//!
//! Executed once at connection startup. Every natural key is a UNIQUE index so
//! a racing duplicate insert is rejected by the database rather than stored.
//! Nullable key columns are folded with `IFNULL` because SQLite treats NULLs as
//! distinct inside UNIQUE constraints.

/// Full schema DDL plus reference data; idempotent thanks to
/// `IF NOT EXISTS` and `INSERT OR IGNORE`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- ── Reference data (seeded below, read-only to ingestion) ──────────────────
-- Seeded rows take a random hyphenated id from the column default.

CREATE TABLE IF NOT EXISTS states (
    state_id     TEXT PRIMARY KEY DEFAULT (lower(hex(randomblob(4)) || '-' || hex(randomblob(2)) || '-' || hex(randomblob(2)) || '-' || hex(randomblob(2)) || '-' || hex(randomblob(6)))),
    abbreviation TEXT NOT NULL UNIQUE,
    name         TEXT
);

CREATE TABLE IF NOT EXISTS parties (
    party_id     TEXT PRIMARY KEY DEFAULT (lower(hex(randomblob(4)) || '-' || hex(randomblob(2)) || '-' || hex(randomblob(2)) || '-' || hex(randomblob(2)) || '-' || hex(randomblob(6)))),
    abbreviation TEXT NOT NULL UNIQUE,
    name         TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS chambers (
    chamber_id   TEXT PRIMARY KEY DEFAULT (lower(hex(randomblob(4)) || '-' || hex(randomblob(2)) || '-' || hex(randomblob(2)) || '-' || hex(randomblob(2)) || '-' || hex(randomblob(6)))),
    name         TEXT NOT NULL UNIQUE,
    abbreviation TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS districts (
    district_id TEXT PRIMARY KEY,
    state_id    TEXT NOT NULL REFERENCES states(state_id),
    number      INTEGER NOT NULL,
    UNIQUE (state_id, number)
);

-- ── Legislators ─────────────────────────────────────────────────────────────

CREATE TABLE IF NOT EXISTS legislators (
    legislator_id TEXT PRIMARY KEY,
    kind          TEXT NOT NULL,   -- 'senator' | 'representative'
    first_name    TEXT NOT NULL,
    last_name     TEXT NOT NULL,
    state_id      TEXT NOT NULL REFERENCES states(state_id),
    party_id      TEXT NOT NULL REFERENCES parties(party_id),
    district_id   TEXT REFERENCES districts(district_id),  -- representatives only
    chamber_id    TEXT REFERENCES chambers(chamber_id),
    CHECK ((kind = 'representative') = (district_id IS NOT NULL))
);

CREATE UNIQUE INDEX IF NOT EXISTS legislators_natural_key ON legislators (
    first_name, last_name, state_id, party_id, IFNULL(district_id, '')
);

-- ── Bills ───────────────────────────────────────────────────────────────────

CREATE TABLE IF NOT EXISTS policy_areas (
    policy_area_id TEXT PRIMARY KEY,
    name           TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS legislative_subjects (
    subject_id TEXT PRIMARY KEY,
    name       TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS committees (
    committee_id   TEXT PRIMARY KEY,
    system_code    TEXT NOT NULL UNIQUE,
    name           TEXT NOT NULL,
    committee_type TEXT,
    chamber_id     TEXT NOT NULL REFERENCES chambers(chamber_id)
);

CREATE TABLE IF NOT EXISTS bills (
    bill_id           TEXT PRIMARY KEY,
    url               TEXT NOT NULL UNIQUE,
    bill_type         TEXT NOT NULL,
    number            INTEGER NOT NULL,
    title             TEXT NOT NULL,
    congress          INTEGER NOT NULL,
    introduced_at     TEXT NOT NULL,   -- RFC 3339 UTC
    last_modified     TEXT,
    origin_chamber_id TEXT REFERENCES chambers(chamber_id),
    cbo_cost_estimate TEXT,
    policy_area_id    TEXT REFERENCES policy_areas(policy_area_id),
    ingested_at       TEXT             -- set once every relation was persisted
);

CREATE TABLE IF NOT EXISTS bill_sponsors (
    bill_id       TEXT NOT NULL REFERENCES bills(bill_id),
    legislator_id TEXT NOT NULL REFERENCES legislators(legislator_id),
    PRIMARY KEY (bill_id, legislator_id)
);

CREATE TABLE IF NOT EXISTS bill_subjects (
    bill_id    TEXT NOT NULL REFERENCES bills(bill_id),
    subject_id TEXT NOT NULL REFERENCES legislative_subjects(subject_id),
    PRIMARY KEY (bill_id, subject_id)
);

CREATE TABLE IF NOT EXISTS bill_committees (
    bill_id      TEXT NOT NULL REFERENCES bills(bill_id),
    committee_id TEXT NOT NULL REFERENCES committees(committee_id),
    PRIMARY KEY (bill_id, committee_id)
);

-- Symmetry is maintained by writing both directions.
CREATE TABLE IF NOT EXISTS related_bills (
    bill_id         TEXT NOT NULL REFERENCES bills(bill_id),
    related_bill_id TEXT NOT NULL REFERENCES bills(bill_id),
    PRIMARY KEY (bill_id, related_bill_id)
);

CREATE TABLE IF NOT EXISTS cosponsorships (
    cosponsorship_id TEXT PRIMARY KEY,
    legislator_id    TEXT NOT NULL REFERENCES legislators(legislator_id),
    bill_id          TEXT NOT NULL REFERENCES bills(bill_id),
    is_original      INTEGER NOT NULL,
    cosponsored_at   TEXT NOT NULL,
    UNIQUE (legislator_id, bill_id, is_original, cosponsored_at)
);

CREATE TABLE IF NOT EXISTS bill_summaries (
    summary_id         TEXT PRIMARY KEY,
    bill_id            TEXT NOT NULL REFERENCES bills(bill_id),
    name               TEXT NOT NULL,
    action_date        TEXT NOT NULL,
    text               TEXT NOT NULL,
    action_description TEXT NOT NULL,
    UNIQUE (bill_id, name, action_date, text, action_description)
);

CREATE TABLE IF NOT EXISTS actions (
    action_id    TEXT PRIMARY KEY,
    bill_id      TEXT NOT NULL REFERENCES bills(bill_id),
    committee_id TEXT REFERENCES committees(committee_id),
    text         TEXT NOT NULL,
    action_type  TEXT NOT NULL,
    action_date  TEXT NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS actions_natural_key ON actions (
    bill_id, IFNULL(committee_id, ''), text, action_type, action_date
);

-- Fully derived; replaced wholesale by every rebuild.
CREATE TABLE IF NOT EXISTS support_splits (
    subject_id  TEXT PRIMARY KEY REFERENCES legislative_subjects(subject_id),
    red_count   INTEGER NOT NULL DEFAULT 0,
    blue_count  INTEGER NOT NULL DEFAULT 0,
    white_count INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS bill_subjects_subject_idx ON bill_subjects(subject_id);
CREATE INDEX IF NOT EXISTS cosponsorships_bill_idx   ON cosponsorships(bill_id);
CREATE INDEX IF NOT EXISTS summaries_bill_idx        ON bill_summaries(bill_id);

-- ── Seed rows ───────────────────────────────────────────────────────────────

INSERT OR IGNORE INTO parties (abbreviation, name) VALUES
  ('D', 'Democratic'),
  ('R', 'Republican'),
  ('I', 'Independent'),
  ('ID', 'Independent Democrat'),
  ('L', 'Libertarian');

INSERT OR IGNORE INTO chambers (name, abbreviation) VALUES
  ('Senate', 'S'),
  ('House', 'H'),
  ('House of Representatives', 'HR'),
  ('Joint', 'J');

INSERT OR IGNORE INTO states (abbreviation, name) VALUES
  ('AL', 'Alabama'),
  ('AK', 'Alaska'),
  ('AZ', 'Arizona'),
  ('AR', 'Arkansas'),
  ('CA', 'California'),
  ('CO', 'Colorado'),
  ('CT', 'Connecticut'),
  ('DE', 'Delaware'),
  ('DC', 'District of Columbia'),
  ('FL', 'Florida'),
  ('GA', 'Georgia'),
  ('HI', 'Hawaii'),
  ('ID', 'Idaho'),
  ('IL', 'Illinois'),
  ('IN', 'Indiana'),
  ('IA', 'Iowa'),
  ('KS', 'Kansas'),
  ('KY', 'Kentucky'),
  ('LA', 'Louisiana'),
  ('ME', 'Maine'),
  ('MD', 'Maryland'),
  ('MA', 'Massachusetts'),
  ('MI', 'Michigan'),
  ('MN', 'Minnesota'),
  ('MS', 'Mississippi'),
  ('MO', 'Missouri'),
  ('MT', 'Montana'),
  ('NE', 'Nebraska'),
  ('NV', 'Nevada'),
  ('NH', 'New Hampshire'),
  ('NJ', 'New Jersey'),
  ('NM', 'New Mexico'),
  ('NY', 'New York'),
  ('NC', 'North Carolina'),
  ('ND', 'North Dakota'),
  ('OH', 'Ohio'),
  ('OK', 'Oklahoma'),
  ('OR', 'Oregon'),
  ('PA', 'Pennsylvania'),
  ('RI', 'Rhode Island'),
  ('SC', 'South Carolina'),
  ('SD', 'South Dakota'),
  ('TN', 'Tennessee'),
  ('TX', 'Texas'),
  ('UT', 'Utah'),
  ('VT', 'Vermont'),
  ('VA', 'Virginia'),
  ('WA', 'Washington'),
  ('WV', 'West Virginia'),
  ('WI', 'Wisconsin'),
  ('WY', 'Wyoming'),
  ('MP', 'Northern Mariana Islands'),
  ('AS', 'American Samoa'),
  ('GU', 'Guam'),
  ('PR', 'Puerto Rico'),
  ('VI', 'U.S. Virgin Islands'),
  ('UM', 'U.S. Minor Outlying Islands'),
  ('FM', 'Micronesia'),
  ('MH', 'Marshall Islands'),
  ('PW', 'Palau');

PRAGMA user_version = 1;
";
