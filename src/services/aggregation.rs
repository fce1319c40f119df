use crate::models::{CategoryMap, ExpenseBreakdown, ExpenseDatum, ExtractedReceipt};

/// Groups receipts by category code resolved against the map and sums the
/// totals per bucket. Pure and total: any input sequence, including the
/// empty one, yields a breakdown; recomputation from the same input yields
/// the same output.
///
/// Rows appear in category declaration order with the fallback bucket last,
/// and only for buckets that received at least one receipt.
pub fn aggregate(receipts: &[ExtractedReceipt], categories: &CategoryMap) -> ExpenseBreakdown {
    let bucket_count = categories.categories.len() + 1;
    let mut sums = vec![0.0f64; bucket_count];
    let mut counts = vec![0usize; bucket_count];

    for receipt in receipts {
        let index = categories
            .bucket_index(&receipt.category_code)
            .unwrap_or(bucket_count - 1);
        sums[index] += receipt.total;
        counts[index] += 1;
    }

    let mut data = Vec::new();
    for (index, category) in categories
        .categories
        .iter()
        .chain(std::iter::once(&categories.fallback))
        .enumerate()
    {
        if counts[index] == 0 {
            continue;
        }
        data.push(ExpenseDatum {
            category: category.name.clone(),
            amount: sums[index],
            color: category.color.clone(),
        });
    }

    let grand_total = data.iter().map(|d| d.amount).sum();
    ExpenseBreakdown { data, grand_total }
}
