pub mod blofin;
